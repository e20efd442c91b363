use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::status::{DisplayStatus, MatchStatus};
use crate::model::team::Category;
use crate::model::{MatchId, TeamId, UserId};

/// Points scored by each side in one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    pub team1: u32,
    pub team2: u32,
}

impl SetScore {
    pub fn new(team1: u32, team2: u32) -> Self {
        Self { team1, team2 }
    }

    /// Team 1 takes the set only with a strictly higher score; a tie counts for team 2.
    pub fn team1_wins(&self) -> bool {
        self.team1 > self.team2
    }
}

/// A scheduled match as produced by the scheduler, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMatch {
    pub category: Category,
    pub team1_id: TeamId,
    pub team2_id: TeamId,
    pub referee_id: TeamId,
    pub match_time: Option<NaiveDateTime>,
}

impl NewMatch {
    pub fn pair_key(&self) -> (TeamId, TeamId) {
        pair_key(self.team1_id, self.team2_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub category: Category,
    pub team1_id: TeamId,
    pub team2_id: TeamId,
    pub referee_id: TeamId,
    #[serde(default)]
    pub match_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub sets: Vec<SetScore>,
    #[serde(default)]
    pub lamp_fee_team1: Option<u32>,
    #[serde(default)]
    pub lamp_fee_team2: Option<u32>,
    #[serde(default)]
    pub winner_id: Option<TeamId>,
    #[serde(default)]
    pub loser_id: Option<TeamId>,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default)]
    pub team1_confirmed: bool,
    #[serde(default)]
    pub team2_confirmed: bool,
    #[serde(default)]
    pub submitted_by: Option<UserId>,
}

impl Match {
    pub fn from_new(id: MatchId, new: NewMatch) -> Self {
        Self {
            id,
            category: new.category,
            team1_id: new.team1_id,
            team2_id: new.team2_id,
            referee_id: new.referee_id,
            match_time: new.match_time,
            sets: Vec::new(),
            lamp_fee_team1: None,
            lamp_fee_team2: None,
            winner_id: None,
            loser_id: None,
            status: MatchStatus::Pending,
            team1_confirmed: false,
            team2_confirmed: false,
            submitted_by: None,
        }
    }

    /// Unordered pair of competitors, smaller id first.
    pub fn pair_key(&self) -> (TeamId, TeamId) {
        pair_key(self.team1_id, self.team2_id)
    }

    pub fn is_competitor(&self, team: TeamId) -> bool {
        self.team1_id == team || self.team2_id == team
    }

    /// True when `team` plays in or referees this match.
    pub fn involves(&self, team: TeamId) -> bool {
        self.is_competitor(team) || self.referee_id == team
    }

    /// Status for the public match list, relative to the league-local time `now`.
    pub fn display_status(&self, now: NaiveDateTime) -> DisplayStatus {
        match self.status {
            MatchStatus::Confirmed => DisplayStatus::Finished,
            MatchStatus::Rejected => DisplayStatus::Rejected,
            MatchStatus::WaitingConfirm if self.team1_confirmed && self.team2_confirmed => {
                DisplayStatus::Finished
            }
            MatchStatus::WaitingConfirm => DisplayStatus::PendingConfirmation,
            MatchStatus::Pending => match self.match_time {
                Some(start) if start <= now => DisplayStatus::InProgress,
                _ => DisplayStatus::NotStarted,
            },
        }
    }
}

pub fn pair_key(a: TeamId, b: TeamId) -> (TeamId, TeamId) {
    if a <= b { (a, b) } else { (b, a) }
}
