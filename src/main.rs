use std::sync::Arc;

use lambda_runtime::{Error, service_fn};
use tracing::info;
use tracing_subscriber::EnvFilter;

use volleyball_league_lambda::config::LeagueConfig;
use volleyball_league_lambda::handler::handler;
use volleyball_league_lambda::league::League;
use volleyball_league_lambda::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize structured logging with tracing
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_current_span(false)
        .with_target(false)
        .with_ansi(false)
        .without_time()
        .try_init();

    let config = LeagueConfig::from_env();
    let store = match &config.data_path {
        Some(path) => {
            let body = std::fs::read_to_string(path)?;
            MemoryStore::from_json(&body)?
        }
        None => MemoryStore::default(),
    };
    info!(timezone = %config.timezone, buffer_weeks = config.buffer_weeks, seeded = config.rng_seed.is_some(), "League configured");

    let league = Arc::new(League::from_config(store, config));
    lambda_runtime::run(service_fn(move |event| {
        let league = Arc::clone(&league);
        async move { handler(&*league, event).await }
    }))
    .await
}
