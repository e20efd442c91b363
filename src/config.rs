use std::env;

use chrono_tz::Tz;
use tracing::warn;

use crate::slots::{DEFAULT_BUFFER_WEEKS, MAX_BUFFER_WEEKS};

#[derive(Debug, Clone)]
pub struct LeagueConfig {
    /// Zone the match calendar is kept in; "now" is converted into it.
    pub timezone: Tz,
    pub buffer_weeks: u32,
    pub rng_seed: Option<u64>,
    pub data_path: Option<String>,
    pub discord_hook_url: Option<String>,
    pub test_discord_hook_url: Option<String>,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Taipei,
            buffer_weeks: DEFAULT_BUFFER_WEEKS,
            rng_seed: None,
            data_path: None,
            discord_hook_url: None,
            test_discord_hook_url: None,
        }
    }
}

impl LeagueConfig {
    /// Read settings from `LEAGUE_*` and `*DISCORD_HOOK_URL` variables. Unparsable values
    /// are logged and replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let timezone = match lookup("LEAGUE_TIMEZONE") {
            Some(name) => name.parse::<Tz>().unwrap_or_else(|e| {
                warn!(value = %name, error = %e, "Invalid LEAGUE_TIMEZONE, using default");
                defaults.timezone
            }),
            None => defaults.timezone,
        };
        let mut buffer_weeks = parse_or(lookup("LEAGUE_BUFFER_WEEKS"), "LEAGUE_BUFFER_WEEKS", defaults.buffer_weeks);
        if buffer_weeks > MAX_BUFFER_WEEKS {
            warn!(value = buffer_weeks, max = MAX_BUFFER_WEEKS, "LEAGUE_BUFFER_WEEKS too large, clamping");
            buffer_weeks = MAX_BUFFER_WEEKS;
        }
        let rng_seed = lookup("LEAGUE_RNG_SEED").and_then(|raw| match raw.parse::<u64>() {
            Ok(seed) => Some(seed),
            Err(e) => {
                warn!(value = %raw, error = %e, "Invalid LEAGUE_RNG_SEED, using entropy");
                None
            }
        });

        Self {
            timezone,
            buffer_weeks,
            rng_seed,
            data_path: lookup("LEAGUE_DATA_PATH").filter(|s| !s.is_empty()),
            discord_hook_url: lookup("DISCORD_HOOK_URL").filter(|s| !s.is_empty()),
            test_discord_hook_url: lookup("TEST_DISCORD_HOOK_URL").filter(|s| !s.is_empty()),
        }
    }
}

fn parse_or(raw: Option<String>, key: &str, default: u32) -> u32 {
    match raw {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!(key, value = %raw, error = %e, "Invalid number, using default");
            default
        }),
        None => default,
    }
}
