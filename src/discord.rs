use thiserror::Error;
use tracing::{error, info};

use crate::league::MatchView;
use crate::model::game::Match;
use crate::model::team::Category;

#[derive(Debug, Error)]
#[error("failed to post to Discord webhook: {0}")]
pub struct NotifyError(String);

/// Discord webhook used for league announcements.
#[derive(Debug, Clone)]
pub struct Discord {
    hook_url: String,
}

impl Discord {
    pub fn new(hook_url: String) -> Self {
        Self { hook_url }
    }

    /// Post a plain text message to the webhook.
    pub fn post(&self, content: &str) -> Result<(), NotifyError> {
        let payload = serde_json::json!({ "content": content });
        match ureq::post(&self.hook_url).send_json(payload) {
            Ok(resp) => {
                info!(status = resp.status().as_u16(), "Posted announcement to Discord webhook");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to post to Discord webhook");
                Err(NotifyError(e.to_string()))
            }
        }
    }
}

/// Announcement for a freshly generated schedule.
pub fn schedule_message(category: &Category, matches: &[Match]) -> String {
    let first = matches.iter().filter_map(|m| m.match_time).min();
    let last = matches.iter().filter_map(|m| m.match_time).max();
    match (first, last) {
        (Some(first), Some(last)) => format!(
            ":volleyball: New {} schedule published\n{} matches from {} to {}",
            category,
            matches.len(),
            first.format("%a %b %e, %Y"),
            last.format("%a %b %e, %Y"),
        ),
        _ => format!(":volleyball: New {} schedule published\nNo matches to play", category),
    }
}

/// Announcement for a result both teams have accepted.
pub fn result_message(view: &MatchView) -> String {
    let sets = view
        .sets
        .iter()
        .map(|s| format!("{}-{}", s.team1, s.team2))
        .collect::<Vec<_>>()
        .join(", ");
    let winner = view.winner.as_deref().unwrap_or("Unknown");
    format!(
        ":volleyball: Result confirmed\n{} vs {}\nSets: {}\n:trophy: {} wins",
        view.team1, view.team2, sets, winner
    )
}
