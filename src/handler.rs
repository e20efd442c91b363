use chrono::{DateTime, NaiveDate, Utc};
use lambda_runtime::{Error, LambdaEvent};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::discord::{self, Discord};
use crate::league::{ErrorKind, League, LeagueError};
use crate::model::team::Category;
use crate::model::{MatchId, TeamId, UserId};
use crate::store::Store;
use crate::workflow::ScoreSheet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Test,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    DrawCycles {
        category: Category,
    },
    GenerateSchedule {
        category: Category,
        cycle_a: Vec<String>,
        cycle_b: Vec<String>,
        start_date: String,
    },
    SubmitResult {
        match_id: MatchId,
        actor: UserId,
        #[serde(default)]
        scores: ScoreSheet,
    },
    Confirm {
        match_id: MatchId,
        actor: UserId,
    },
    Reject {
        match_id: MatchId,
        actor: UserId,
    },
    Overview,
    TeamCalendar {
        team_id: TeamId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub mode: Mode,
    pub action: Action,
    #[serde(default)]
    pub discord_hook_url: Option<String>,
    #[serde(default)]
    pub test_discord_hook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    League(#[from] LeagueError),
    #[error("failed to encode response data: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of one action, plus the announcement it warrants, if any.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub message: String,
    pub data: serde_json::Value,
    pub announcement: Option<String>,
}

pub fn parse_start_date(raw: &str) -> Result<NaiveDate, LeagueError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| LeagueError::Validation(format!("invalid start_date {raw:?}, expected YYYY-MM-DD: {e}")))
}

/// Run one action against the league. Synchronous; every action is a short unit of work.
pub fn dispatch<S: Store, R: Rng>(
    league: &League<S, R>,
    action: &Action,
    now: DateTime<Utc>,
) -> Result<Outcome, HandlerError> {
    let outcome = match action {
        Action::DrawCycles { category } => {
            let draw = league.draw_cycles(category)?;
            Outcome {
                message: format!(
                    "Drew {} teams into cycle A and {} into cycle B",
                    draw.cycle_a.len(),
                    draw.cycle_b.len()
                ),
                data: serde_json::to_value(&draw)?,
                announcement: None,
            }
        }
        Action::GenerateSchedule { category, cycle_a, cycle_b, start_date } => {
            let start = parse_start_date(start_date)?;
            let matches = league.generate_schedule(category, cycle_a, cycle_b, start)?;
            Outcome {
                message: format!("Scheduled {} matches for {}", matches.len(), category),
                announcement: Some(discord::schedule_message(category, &matches)),
                data: serde_json::to_value(&matches)?,
            }
        }
        Action::SubmitResult { match_id, actor, scores } => {
            let game = league.submit_result(*match_id, scores, *actor)?;
            Outcome {
                message: format!("Result for match {} is waiting for confirmation", game.id),
                data: serde_json::to_value(&game)?,
                announcement: None,
            }
        }
        Action::Confirm { match_id, actor } => {
            let confirmation = league.confirm(*match_id, *actor)?;
            let game = confirmation.game;
            let announcement = if confirmation.settled {
                league
                    .match_overview(now)?
                    .into_iter()
                    .find(|v| v.id == game.id)
                    .map(|view| discord::result_message(&view))
            } else {
                None
            };
            Outcome {
                message: format!("Match {} is {}", game.id, game.status),
                data: serde_json::to_value(&game)?,
                announcement,
            }
        }
        Action::Reject { match_id, actor } => {
            let game = league.reject(*match_id, *actor)?;
            Outcome {
                message: format!("Result for match {} was rejected and must be resubmitted", game.id),
                data: serde_json::to_value(&game)?,
                announcement: None,
            }
        }
        Action::Overview => {
            let views = league.match_overview(now)?;
            Outcome {
                message: format!("{} matches", views.len()),
                data: serde_json::to_value(&views)?,
                announcement: None,
            }
        }
        Action::TeamCalendar { team_id } => {
            let ics = league.team_calendar(*team_id)?;
            Outcome {
                message: format!("Calendar for team {}", team_id),
                data: serde_json::Value::String(ics),
                announcement: None,
            }
        }
    };
    Ok(outcome)
}

#[instrument(skip(league, event))]
pub async fn handler<S: Store, R: Rng + Send>(
    league: &League<S, R>,
    event: LambdaEvent<Request>,
) -> Result<Response, Error> {
    let payload = event.payload;
    let config = league.config();

    // Select destination based on request mode, falling back to the environment
    let hook_url = match payload.mode {
        Mode::Test => payload.test_discord_hook_url.or_else(|| config.test_discord_hook_url.clone()),
        Mode::Production => payload.discord_hook_url.or_else(|| config.discord_hook_url.clone()),
    };

    let outcome = match dispatch(league, &payload.action, Utc::now()) {
        Ok(outcome) => outcome,
        Err(HandlerError::League(e)) => {
            warn!(error = %e, kind = ?e.kind(), "Action refused");
            return Ok(Response { message: e.to_string(), data: serde_json::Value::Null, error: Some(e.kind()) });
        }
        Err(e) => return Err(e.into()),
    };
    info!(message = %outcome.message, "Action completed");

    if let (Some(announcement), Some(hook_url)) = (outcome.announcement, hook_url) {
        let discord = Discord::new(hook_url);
        // ureq is blocking, keep it off the async worker
        match tokio::task::spawn_blocking(move || discord.post(&announcement)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Announcement not delivered"),
            Err(e) => error!(error = %e, "Announcement task join error"),
        }
    }

    Ok(Response { message: outcome.message, data: outcome.data, error: None })
}
