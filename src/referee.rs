use std::collections::HashMap;

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::model::TeamId;

/// Keeps referee duty balanced over a whole scheduling run.
#[derive(Debug, Clone, Default)]
pub struct RefereeAllocator {
    counts: HashMap<TeamId, u32>,
}

impl RefereeAllocator {
    /// Start from historical duty counts; unseen teams count as zero.
    pub fn seeded(history: impl IntoIterator<Item = (TeamId, u32)>) -> Self {
        Self { counts: history.into_iter().collect() }
    }

    pub fn count(&self, team: TeamId) -> u32 {
        self.counts.get(&team).copied().unwrap_or(0)
    }

    /// Pick one of the least used teams among `candidates`, uniformly at random on ties,
    /// and charge it one duty. Returns None only when `candidates` is empty.
    pub fn pick<R: Rng + ?Sized>(&mut self, candidates: &[TeamId], rng: &mut R) -> Option<TeamId> {
        let min = candidates.iter().map(|t| self.count(*t)).min()?;
        let least_used: Vec<TeamId> = candidates
            .iter()
            .copied()
            .filter(|t| self.count(*t) == min)
            .collect();
        let chosen = *least_used.choose(rng)?;
        *self.counts.entry(chosen).or_insert(0) += 1;
        debug!(referee = chosen, duties = min + 1, tied = least_used.len(), "Picked referee");
        Some(chosen)
    }
}
