use std::fmt;

use serde::{Deserialize, Serialize};

/// Persisted workflow state of a match result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Pending,
    WaitingConfirm,
    Confirmed,
    Rejected,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Pending => f.write_str("pending"),
            MatchStatus::WaitingConfirm => f.write_str("waiting_confirm"),
            MatchStatus::Confirmed => f.write_str("confirmed"),
            MatchStatus::Rejected => f.write_str("rejected"),
        }
    }
}

/// Status shown to visitors; derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayStatus {
    #[serde(rename = "not started")]
    NotStarted,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "pending confirmation")]
    PendingConfirmation,
    #[serde(rename = "finished")]
    Finished,
    #[serde(rename = "rejected")]
    Rejected,
}
