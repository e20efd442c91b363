use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::LeagueConfig;
use crate::ical;
use crate::locks::KeyedLocks;
use crate::model::game::{Match, SetScore};
use crate::model::status::{DisplayStatus, MatchStatus};
use crate::model::team::{Category, Cycle, Team};
use crate::model::user::User;
use crate::model::{MatchId, TeamId, UserId};
use crate::scheduler::{ScheduleError, plan_schedule};
use crate::store::{Store, StoreError, Transaction};
use crate::workflow::{self, ScoreSheet, WorkflowError};

#[derive(Debug, Error)]
pub enum LeagueError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("user {0} not found")]
    UnknownUser(UserId),
    #[error("team {0} not found")]
    UnknownTeam(TeamId),
    #[error("match {0} not found")]
    UnknownMatch(MatchId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    Capacity,
    NotFound,
    Storage,
}

impl LeagueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeagueError::Validation(_) => ErrorKind::Validation,
            LeagueError::Workflow(
                WorkflowError::NotRefereeCaptain | WorkflowError::NotCompetingCaptain,
            ) => ErrorKind::Authorization,
            LeagueError::Workflow(_) => ErrorKind::Validation,
            LeagueError::Schedule(_) => ErrorKind::Capacity,
            LeagueError::UnknownUser(_) | LeagueError::UnknownTeam(_) | LeagueError::UnknownMatch(_) => {
                ErrorKind::NotFound
            }
            LeagueError::Store(_) => ErrorKind::Storage,
        }
    }
}

/// Team names per cycle after a draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleDraw {
    pub cycle_a: Vec<String>,
    pub cycle_b: Vec<String>,
}

/// Read-only row of the public match list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    pub id: MatchId,
    pub category: Category,
    pub team1: String,
    pub team2: String,
    pub referee: String,
    pub match_time: Option<NaiveDateTime>,
    pub sets: Vec<SetScore>,
    pub winner: Option<String>,
    pub status: MatchStatus,
    pub display_status: DisplayStatus,
    pub team1_confirmed: bool,
    pub team2_confirmed: bool,
}

/// Match after a confirmation, and whether this call is the one that confirmed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub game: Match,
    pub settled: bool,
}

/// Entry point for scheduling and result handling. Runs for one category are serialized,
/// as are transitions on one match; everything else proceeds independently.
pub struct League<S: Store, R: Rng = StdRng> {
    store: S,
    rng: Mutex<R>,
    config: LeagueConfig,
    category_locks: KeyedLocks<Category>,
    match_locks: KeyedLocks<MatchId>,
}

impl<S: Store> League<S, StdRng> {
    /// League with a random source seeded from `config.rng_seed`, or from OS entropy.
    pub fn from_config(store: S, config: LeagueConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::new(store, rng, config)
    }
}

impl<S: Store, R: Rng> League<S, R> {
    pub fn new(store: S, rng: R, config: LeagueConfig) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
            config,
            category_locks: KeyedLocks::default(),
            match_locks: KeyedLocks::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LeagueConfig {
        &self.config
    }

    /// Independent random stream for one run, so the shared source is only held briefly.
    fn run_rng(&self) -> StdRng {
        let seed: u64 = self.rng.lock().unwrap_or_else(PoisonError::into_inner).random();
        StdRng::seed_from_u64(seed)
    }

    /// Randomly split the teams of `category` in two; on an odd count cycle A gets the extra team.
    /// The cycle label is stored on every team.
    #[instrument(level = "info", skip(self, category), fields(category = %category))]
    pub fn draw_cycles(&self, category: &Category) -> Result<CycleDraw, LeagueError> {
        let lock = self.category_locks.handle(category);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut tx = self.store.begin()?;
        let mut teams = tx.teams_in_category(category)?;
        teams.sort_by_key(|t| t.id);
        teams.shuffle(&mut self.run_rng());

        let split = teams.len().div_ceil(2);
        let (cycle_a, cycle_b) = teams.split_at(split);
        for team in cycle_a {
            tx.set_team_cycle(team.id, Some(Cycle::A))?;
        }
        for team in cycle_b {
            tx.set_team_cycle(team.id, Some(Cycle::B))?;
        }
        tx.commit()?;

        let draw = CycleDraw {
            cycle_a: cycle_a.iter().map(|t| t.name.clone()).collect(),
            cycle_b: cycle_b.iter().map(|t| t.name.clone()).collect(),
        };
        info!(cycle_a = draw.cycle_a.len(), cycle_b = draw.cycle_b.len(), "Cycles drawn");
        Ok(draw)
    }

    /// Replace the whole schedule of `category`. The old matches are deleted and the new ones
    /// inserted in a single transaction, so a failed run leaves the previous schedule in place.
    #[instrument(level = "info", skip(self, category, cycle_a, cycle_b, start), fields(category = %category, start = %start))]
    pub fn generate_schedule(
        &self,
        category: &Category,
        cycle_a: &[String],
        cycle_b: &[String],
        start: NaiveDate,
    ) -> Result<Vec<Match>, LeagueError> {
        let lock = self.category_locks.handle(category);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut tx = self.store.begin()?;
        let teams = tx.teams_in_category(category)?;
        let (ids_a, ids_b) = resolve_cycles(&teams, cycle_a, cycle_b)?;

        let deleted = tx.delete_matches_in_category(category)?;
        let remaining = tx.matches()?;
        info!(deleted, "Cleared previous schedule");

        let mut rng = self.run_rng();
        let planned = plan_schedule(
            category,
            &ids_a,
            &ids_b,
            start,
            self.config.buffer_weeks,
            &remaining,
            &mut rng,
        )
        .inspect_err(|e| error!(error = %e, "Scheduling failed, keeping previous schedule"))?;

        for id in &ids_a {
            tx.set_team_cycle(*id, Some(Cycle::A))?;
        }
        for id in &ids_b {
            tx.set_team_cycle(*id, Some(Cycle::B))?;
        }

        let mut created = Vec::with_capacity(planned.len());
        for new in planned {
            match tx.insert_match(new) {
                Ok(game) => created.push(game),
                Err(StoreError::DuplicatePair(a, b)) => {
                    warn!(team1 = a, team2 = b, "Pair already scheduled, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
        tx.commit()?;

        info!(matches = created.len(), "Schedule generated");
        Ok(created)
    }

    /// Referee captain records the score sheet.
    pub fn submit_result(&self, match_id: MatchId, sheet: &ScoreSheet, actor: UserId) -> Result<Match, LeagueError> {
        self.transition(match_id, actor, "submit_result", |game, user| {
            workflow::submit_result(game, sheet, user)
        })
        .map(|(game, _)| game)
    }

    /// `settled` is only set when this confirmation moved the match to `confirmed`; repeated
    /// confirmations of a settled match leave it unset.
    pub fn confirm(&self, match_id: MatchId, actor: UserId) -> Result<Confirmation, LeagueError> {
        let (game, before) = self.transition(match_id, actor, "confirm", workflow::confirm)?;
        let settled = before != MatchStatus::Confirmed && game.status == MatchStatus::Confirmed;
        Ok(Confirmation { game, settled })
    }

    pub fn reject(&self, match_id: MatchId, actor: UserId) -> Result<Match, LeagueError> {
        self.transition(match_id, actor, "reject", workflow::reject).map(|(game, _)| game)
    }

    /// Apply one workflow step under the match lock. Returns the updated match and the status
    /// it had before.
    #[instrument(level = "info", skip(self, apply))]
    fn transition(
        &self,
        match_id: MatchId,
        actor: UserId,
        action: &'static str,
        apply: impl FnOnce(&mut Match, &User) -> Result<(), WorkflowError>,
    ) -> Result<(Match, MatchStatus), LeagueError> {
        let lock = self.match_locks.handle(&match_id);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut tx = self.store.begin()?;
        let mut game = tx.get_match(match_id)?.ok_or(LeagueError::UnknownMatch(match_id))?;
        let user = tx.user(actor)?.ok_or(LeagueError::UnknownUser(actor))?;
        let before = game.status;
        apply(&mut game, &user).inspect_err(|e| warn!(error = %e, "Transition refused"))?;
        tx.update_match(&game)?;
        tx.commit()?;
        Ok((game, before))
    }

    /// Current local time of the league calendar.
    pub fn local_now(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.config.timezone).naive_local()
    }

    /// Every match with team names and its derived display status, in calendar order.
    #[instrument(level = "info", skip(self))]
    pub fn match_overview(&self, now: DateTime<Utc>) -> Result<Vec<MatchView>, LeagueError> {
        let local_now = self.local_now(now);
        let tx = self.store.begin()?;
        let mut matches = tx.matches()?;
        let names = team_names(&tx, &matches)?;
        drop(tx);

        matches.sort_by_key(|m| (m.match_time.is_none(), m.match_time, m.id));
        let name_of = |id: TeamId| names.get(&id).cloned().unwrap_or_else(|| format!("Team #{id}"));
        let views = matches
            .into_iter()
            .map(|m| MatchView {
                id: m.id,
                display_status: m.display_status(local_now),
                team1: name_of(m.team1_id),
                team2: name_of(m.team2_id),
                referee: name_of(m.referee_id),
                winner: m.winner_id.map(&name_of),
                category: m.category,
                match_time: m.match_time,
                sets: m.sets,
                status: m.status,
                team1_confirmed: m.team1_confirmed,
                team2_confirmed: m.team2_confirmed,
            })
            .collect();
        Ok(views)
    }

    /// iCalendar feed of the matches a team plays or referees.
    #[instrument(level = "info", skip(self))]
    pub fn team_calendar(&self, team_id: TeamId) -> Result<String, LeagueError> {
        let tx = self.store.begin()?;
        let team = tx.team(team_id)?.ok_or(LeagueError::UnknownTeam(team_id))?;
        let matches: Vec<Match> = tx
            .matches_in_category(&team.category)?
            .into_iter()
            .filter(|m| m.involves(team_id))
            .collect();
        let names = team_names(&tx, &matches)?;
        drop(tx);

        Ok(ical::team_calendar(&team, &matches, &names, self.config.timezone))
    }
}

fn team_names<T: Transaction>(tx: &T, matches: &[Match]) -> Result<HashMap<TeamId, String>, StoreError> {
    let ids: HashSet<TeamId> = matches
        .iter()
        .flat_map(|m| [m.team1_id, m.team2_id, m.referee_id])
        .collect();
    let mut names = HashMap::with_capacity(ids.len());
    for id in ids {
        if let Some(team) = tx.team(id)? {
            names.insert(id, team.name);
        }
    }
    Ok(names)
}

/// Map the requested cycle names onto teams of the category.
fn resolve_cycles(
    teams: &[Team],
    cycle_a: &[String],
    cycle_b: &[String],
) -> Result<(Vec<TeamId>, Vec<TeamId>), LeagueError> {
    let by_name: HashMap<&str, TeamId> = teams.iter().map(|t| (t.name.as_str(), t.id)).collect();
    let mut seen = HashSet::new();
    let mut resolve = |names: &[String]| -> Result<Vec<TeamId>, LeagueError> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                return Err(LeagueError::Validation("team name must not be empty".to_string()));
            }
            let id = *by_name
                .get(name)
                .ok_or_else(|| LeagueError::Validation(format!("unknown team {name:?} in this category")))?;
            if !seen.insert(id) {
                return Err(LeagueError::Validation(format!("team {name:?} is listed more than once")));
            }
            ids.push(id);
        }
        Ok(ids)
    };
    let ids_a = resolve(cycle_a)?;
    let ids_b = resolve(cycle_b)?;
    Ok((ids_a, ids_b))
}
