use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::game::{Match, NewMatch};
use crate::model::team::{Category, Cycle, Team};
use crate::model::user::User;
use crate::model::{MatchId, TeamId, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("team {0} not found")]
    TeamNotFound(TeamId),
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error("a match between teams {0} and {1} already exists")]
    DuplicatePair(TeamId, TeamId),
    #[error("team name {name:?} is already used in category {category}")]
    DuplicateTeamName { category: Category, name: String },
    #[error("store snapshot is invalid: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence collaborator. All reads and writes of a unit of work go through one
/// transaction; dropping it without `commit` discards every write.
pub trait Store: Send + Sync {
    type Tx<'a>: Transaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Tx<'_>, StoreError>;
}

pub trait Transaction {
    fn teams_in_category(&self, category: &Category) -> Result<Vec<Team>, StoreError>;
    fn team(&self, id: TeamId) -> Result<Option<Team>, StoreError>;
    fn set_team_cycle(&mut self, id: TeamId, cycle: Option<Cycle>) -> Result<(), StoreError>;
    fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    fn matches(&self) -> Result<Vec<Match>, StoreError>;
    fn matches_in_category(&self, category: &Category) -> Result<Vec<Match>, StoreError>;
    fn get_match(&self, id: MatchId) -> Result<Option<Match>, StoreError>;
    fn insert_match(&mut self, new: NewMatch) -> Result<Match, StoreError>;
    fn update_match(&mut self, game: &Match) -> Result<(), StoreError>;
    fn delete_matches_in_category(&mut self, category: &Category) -> Result<usize, StoreError>;
    fn commit(self) -> Result<(), StoreError>;
}

/// Serializable content of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub matches: Vec<Match>,
    #[serde(default)]
    pub next_match_id: MatchId,
}

impl Snapshot {
    fn allocate_match_id(&mut self) -> MatchId {
        let floor = self.matches.iter().map(|m| m.id).max().unwrap_or(0);
        self.next_match_id = self.next_match_id.max(floor) + 1;
        self.next_match_id
    }
}

/// In-process store. A transaction holds the write lock for its whole lifetime and edits a
/// private copy of the data, which replaces the shared copy on commit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { state: Mutex::new(snapshot) }
    }

    /// Load teams, users and matches from a JSON document.
    pub fn from_json(body: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot = serde_json::from_str(body)?;
        let store = Self::default();
        for team in snapshot.teams {
            store.insert_team(team)?;
        }
        for user in snapshot.users {
            store.insert_user(user);
        }
        {
            let mut state = store.lock();
            state.matches = snapshot.matches;
            state.next_match_id = snapshot.next_match_id;
        }
        Ok(store)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    /// Add a team; names are unique within a category.
    pub fn insert_team(&self, team: Team) -> Result<(), StoreError> {
        let mut state = self.lock();
        let clash = state
            .teams
            .iter()
            .any(|t| t.category == team.category && t.name == team.name);
        if clash {
            return Err(StoreError::DuplicateTeamName { category: team.category, name: team.name });
        }
        state.teams.push(team);
        Ok(())
    }

    pub fn insert_user(&self, user: User) {
        let mut state = self.lock();
        state.users.retain(|u| u.id != user.id);
        state.users.push(user);
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MemoryTx<'a> {
    guard: MutexGuard<'a, Snapshot>,
    work: Snapshot,
}

impl Store for MemoryStore {
    type Tx<'a> = MemoryTx<'a>;

    fn begin(&self) -> Result<MemoryTx<'_>, StoreError> {
        let guard = self.lock();
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }
}

impl Transaction for MemoryTx<'_> {
    fn teams_in_category(&self, category: &Category) -> Result<Vec<Team>, StoreError> {
        Ok(self.work.teams.iter().filter(|t| &t.category == category).cloned().collect())
    }

    fn team(&self, id: TeamId) -> Result<Option<Team>, StoreError> {
        Ok(self.work.teams.iter().find(|t| t.id == id).cloned())
    }

    fn set_team_cycle(&mut self, id: TeamId, cycle: Option<Cycle>) -> Result<(), StoreError> {
        let team = self
            .work
            .teams
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::TeamNotFound(id))?;
        team.cycle = cycle;
        Ok(())
    }

    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.work.users.iter().find(|u| u.id == id).cloned())
    }

    fn matches(&self) -> Result<Vec<Match>, StoreError> {
        Ok(self.work.matches.clone())
    }

    fn matches_in_category(&self, category: &Category) -> Result<Vec<Match>, StoreError> {
        Ok(self.work.matches.iter().filter(|m| &m.category == category).cloned().collect())
    }

    fn get_match(&self, id: MatchId) -> Result<Option<Match>, StoreError> {
        Ok(self.work.matches.iter().find(|m| m.id == id).cloned())
    }

    fn insert_match(&mut self, new: NewMatch) -> Result<Match, StoreError> {
        let key = new.pair_key();
        if self.work.matches.iter().any(|m| m.pair_key() == key) {
            return Err(StoreError::DuplicatePair(key.0, key.1));
        }
        let id = self.work.allocate_match_id();
        let game = Match::from_new(id, new);
        self.work.matches.push(game.clone());
        Ok(game)
    }

    fn update_match(&mut self, game: &Match) -> Result<(), StoreError> {
        let slot = self
            .work
            .matches
            .iter_mut()
            .find(|m| m.id == game.id)
            .ok_or(StoreError::MatchNotFound(game.id))?;
        *slot = game.clone();
        Ok(())
    }

    fn delete_matches_in_category(&mut self, category: &Category) -> Result<usize, StoreError> {
        let before = self.work.matches.len();
        self.work.matches.retain(|m| &m.category != category);
        Ok(before - self.work.matches.len())
    }

    fn commit(mut self) -> Result<(), StoreError> {
        debug!(matches = self.work.matches.len(), "Committing");
        *self.guard = std::mem::take(&mut self.work);
        Ok(())
    }
}
