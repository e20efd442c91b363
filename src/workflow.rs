use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::TeamId;
use crate::model::game::{Match, SetScore};
use crate::model::status::MatchStatus;
use crate::model::user::User;

#[derive(Debug, Error, PartialEq)]
pub enum WorkflowError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("the first two sets were split 1-1, a third set score is required")]
    ThirdSetRequired,
    #[error("only the captain of the referee team can submit the result")]
    NotRefereeCaptain,
    #[error("only a captain of one of the competing teams can confirm or reject the result")]
    NotCompetingCaptain,
    #[error("cannot {action} a match whose status is {status}")]
    InvalidState {
        action: &'static str,
        status: MatchStatus,
    },
}

/// Score sheet filled in by the referee. Fields are optional so that a missing value is
/// reported as a validation error rather than failing to decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSheet {
    #[serde(default)]
    pub set1_team1: Option<u32>,
    #[serde(default)]
    pub set1_team2: Option<u32>,
    #[serde(default)]
    pub set2_team1: Option<u32>,
    #[serde(default)]
    pub set2_team2: Option<u32>,
    #[serde(default)]
    pub set3_team1: Option<u32>,
    #[serde(default)]
    pub set3_team2: Option<u32>,
    #[serde(default)]
    pub lamp_fee_team1: Option<u32>,
    #[serde(default)]
    pub lamp_fee_team2: Option<u32>,
}

impl ScoreSheet {
    /// Sheet for a match decided in two sets.
    pub fn two_sets(set1: (u32, u32), set2: (u32, u32), lamp_fees: (u32, u32)) -> Self {
        Self {
            set1_team1: Some(set1.0),
            set1_team2: Some(set1.1),
            set2_team1: Some(set2.0),
            set2_team2: Some(set2.1),
            set3_team1: None,
            set3_team2: None,
            lamp_fee_team1: Some(lamp_fees.0),
            lamp_fee_team2: Some(lamp_fees.1),
        }
    }

    pub fn with_third_set(mut self, set3: (u32, u32)) -> Self {
        self.set3_team1 = Some(set3.0);
        self.set3_team2 = Some(set3.1);
        self
    }
}

/// A validated score sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub sets: Vec<SetScore>,
    pub team1_sets: usize,
    pub team2_sets: usize,
    pub lamp_fees: (u32, u32),
}

impl MatchResult {
    pub fn team1_won(&self) -> bool {
        self.team1_sets > self.team2_sets
    }
}

fn required(value: Option<u32>, field: &'static str) -> Result<u32, WorkflowError> {
    value.ok_or(WorkflowError::MissingField(field))
}

/// Check a sheet and count set wins. A third set is only read when the first two split,
/// and is then mandatory.
pub fn score(sheet: &ScoreSheet) -> Result<MatchResult, WorkflowError> {
    let mut sets = vec![
        SetScore::new(
            required(sheet.set1_team1, "set1_team1")?,
            required(sheet.set1_team2, "set1_team2")?,
        ),
        SetScore::new(
            required(sheet.set2_team1, "set2_team1")?,
            required(sheet.set2_team2, "set2_team2")?,
        ),
    ];
    let lamp_fees = (
        required(sheet.lamp_fee_team1, "lamp_fee_team1")?,
        required(sheet.lamp_fee_team2, "lamp_fee_team2")?,
    );

    if sets[0].team1_wins() != sets[1].team1_wins() {
        match (sheet.set3_team1, sheet.set3_team2) {
            (Some(a), Some(b)) => sets.push(SetScore::new(a, b)),
            _ => return Err(WorkflowError::ThirdSetRequired),
        }
    }

    let team1_sets = sets.iter().filter(|s| s.team1_wins()).count();
    let team2_sets = sets.len() - team1_sets;
    Ok(MatchResult { sets, team1_sets, team2_sets, lamp_fees })
}

/// Record the referee's result. Moves the match to `waiting_confirm` and clears both
/// confirmations; nothing changes when validation fails.
pub fn submit_result(game: &mut Match, sheet: &ScoreSheet, actor: &User) -> Result<(), WorkflowError> {
    if !actor.captains(game.referee_id) {
        warn!(match_id = game.id, user = actor.id, "Result submission refused");
        return Err(WorkflowError::NotRefereeCaptain);
    }
    if game.status == MatchStatus::Confirmed {
        return Err(WorkflowError::InvalidState { action: "submit a result for", status: game.status });
    }
    let result = score(sheet)?;

    let (winner, loser) = if result.team1_won() {
        (game.team1_id, game.team2_id)
    } else {
        (game.team2_id, game.team1_id)
    };
    game.sets = result.sets;
    game.lamp_fee_team1 = Some(result.lamp_fees.0);
    game.lamp_fee_team2 = Some(result.lamp_fees.1);
    game.winner_id = Some(winner);
    game.loser_id = Some(loser);
    game.status = MatchStatus::WaitingConfirm;
    game.team1_confirmed = false;
    game.team2_confirmed = false;
    game.submitted_by = Some(actor.id);

    info!(match_id = game.id, winner, loser, sets = game.sets.len(), "Result submitted");
    Ok(())
}

fn competing_team(game: &Match, actor: &User) -> Result<TeamId, WorkflowError> {
    [game.team1_id, game.team2_id]
        .into_iter()
        .find(|team| actor.captains(*team))
        .ok_or(WorkflowError::NotCompetingCaptain)
}

/// A competing captain accepts the submitted result. Both acceptances confirm the match.
pub fn confirm(game: &mut Match, actor: &User) -> Result<(), WorkflowError> {
    let team = competing_team(game, actor)?;
    match game.status {
        MatchStatus::WaitingConfirm => {}
        // Already settled by both sides, nothing left to record
        MatchStatus::Confirmed => return Ok(()),
        status => return Err(WorkflowError::InvalidState { action: "confirm", status }),
    }

    if team == game.team1_id {
        game.team1_confirmed = true;
    } else {
        game.team2_confirmed = true;
    }
    if game.team1_confirmed && game.team2_confirmed {
        game.status = MatchStatus::Confirmed;
    }

    info!(match_id = game.id, team, status = %game.status, "Result confirmed by team");
    Ok(())
}

/// A competing captain contests the submitted result; the referee has to submit again.
pub fn reject(game: &mut Match, actor: &User) -> Result<(), WorkflowError> {
    let team = competing_team(game, actor)?;
    if game.status != MatchStatus::WaitingConfirm {
        return Err(WorkflowError::InvalidState { action: "reject", status: game.status });
    }

    game.status = MatchStatus::Rejected;
    game.team1_confirmed = false;
    game.team2_confirmed = false;

    info!(match_id = game.id, team, "Result rejected");
    Ok(())
}
