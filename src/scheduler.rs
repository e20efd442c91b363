use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use chrono::{NaiveDate, Timelike};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::model::TeamId;
use crate::model::game::{Match, NewMatch, pair_key};
use crate::model::slot::TimeSlot;
use crate::model::team::{Category, Cycle};
use crate::referee::RefereeAllocator;
use crate::slots::{TimeSlots, required_matches, schedule_end_date};

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("no free date left for {team1} vs {team2} (referee {referee}) in cycle {cycle}")]
    NoSlotAvailable {
        cycle: Cycle,
        team1: TeamId,
        team2: TeamId,
        referee: TeamId,
    },
    #[error("cycle {cycle} has matches to play but cycle {} has no teams to referee them", .cycle.opposite())]
    NoRefereeAvailable { cycle: Cycle },
}

/// Every unordered pair of teams in a cycle, each exactly once.
pub fn round_robin_pairs(cycle: &[TeamId]) -> Vec<(TeamId, TeamId)> {
    let mut pairs = Vec::with_capacity(cycle.len() * cycle.len().saturating_sub(1) / 2);
    for (i, first) in cycle.iter().enumerate() {
        for second in &cycle[i + 1..] {
            pairs.push((*first, *second));
        }
    }
    pairs
}

/// Remaining slots per calendar date, oldest date first.
#[derive(Debug, Clone, Default)]
struct SlotPool {
    days: BTreeMap<NaiveDate, VecDeque<TimeSlot>>,
}

impl SlotPool {
    fn new(slots: TimeSlots) -> Self {
        let mut days: BTreeMap<NaiveDate, VecDeque<TimeSlot>> = BTreeMap::new();
        for slot in slots {
            days.entry(slot.date).or_default().push_back(slot);
        }
        Self { days }
    }

    fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    /// Earliest remaining slot on `date`.
    fn take(&mut self, date: NaiveDate) -> Option<TimeSlot> {
        let slots = self.days.get_mut(&date)?;
        let slot = slots.pop_front()?;
        if slots.is_empty() {
            self.days.remove(&date);
        }
        Some(slot)
    }

    fn remove(&mut self, slot: TimeSlot) {
        if let Some(slots) = self.days.get_mut(&slot.date) {
            slots.retain(|s| *s != slot);
            if slots.is_empty() {
                self.days.remove(&slot.date);
            }
        }
    }
}

/// Teams already booked (playing or refereeing) per date.
#[derive(Debug, Clone, Default)]
struct DayBook {
    busy: HashMap<NaiveDate, HashSet<TeamId>>,
}

impl DayBook {
    fn is_free(&self, date: NaiveDate, teams: &[TeamId]) -> bool {
        self.busy
            .get(&date)
            .is_none_or(|booked| teams.iter().all(|t| !booked.contains(t)))
    }

    fn book(&mut self, date: NaiveDate, teams: &[TeamId]) {
        self.busy.entry(date).or_default().extend(teams.iter().copied());
    }
}

/// Round-robin draw for one category, shared across both cycles so that slots, referee duty
/// and per-day bookings carry over from cycle A to cycle B.
pub struct RoundRobinScheduler<'r, R: Rng + ?Sized> {
    category: Category,
    rng: &'r mut R,
    referees: RefereeAllocator,
    pool: SlotPool,
    days: DayBook,
    taken_pairs: HashSet<(TeamId, TeamId)>,
}

impl<'r, R: Rng + ?Sized> RoundRobinScheduler<'r, R> {
    /// `existing` are matches still persisted when the run starts, in any category. They block
    /// their pairs, their dates for the teams involved, and their exact slot. Referee history
    /// is taken from those in the same category.
    pub fn new(
        category: Category,
        start: NaiveDate,
        end: NaiveDate,
        existing: &[Match],
        rng: &'r mut R,
    ) -> Self {
        let mut history: HashMap<TeamId, u32> = HashMap::new();
        let mut pool = SlotPool::new(TimeSlots::between(start, end));
        let mut days = DayBook::default();
        let mut taken_pairs = HashSet::new();
        for m in existing {
            taken_pairs.insert(m.pair_key());
            if m.category == category {
                *history.entry(m.referee_id).or_insert(0) += 1;
            }
            if let Some(time) = m.match_time {
                days.book(time.date(), &[m.team1_id, m.team2_id, m.referee_id]);
                pool.remove(TimeSlot { date: time.date(), hour: time.hour() });
            }
        }

        Self {
            category,
            rng,
            referees: RefereeAllocator::seeded(history),
            pool,
            days,
            taken_pairs,
        }
    }

    /// Schedule every pairing of `teams`, refereed by teams of `opposing`.
    #[instrument(level = "info", skip(self, teams, opposing), fields(category = %self.category, teams = teams.len()))]
    pub fn schedule_cycle(
        &mut self,
        cycle: Cycle,
        teams: &[TeamId],
        opposing: &[TeamId],
    ) -> Result<Vec<NewMatch>, ScheduleError> {
        let mut pairs = round_robin_pairs(teams);
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        if opposing.is_empty() {
            return Err(ScheduleError::NoRefereeAvailable { cycle });
        }
        pairs.shuffle(&mut *self.rng);

        let mut planned = Vec::with_capacity(pairs.len());
        for (team1, team2) in pairs {
            if !self.taken_pairs.insert(pair_key(team1, team2)) {
                debug!(team1, team2, "Pair already has a match, skipping");
                continue;
            }

            let referee = self
                .referees
                .pick(opposing, &mut *self.rng)
                .ok_or(ScheduleError::NoRefereeAvailable { cycle })?;

            let involved = [team1, team2, referee];
            let date = self
                .pool
                .dates()
                .find(|d| self.days.is_free(*d, &involved))
                .ok_or(ScheduleError::NoSlotAvailable { cycle, team1, team2, referee })?;
            let slot = self
                .pool
                .take(date)
                .ok_or(ScheduleError::NoSlotAvailable { cycle, team1, team2, referee })?;
            self.days.book(date, &involved);

            planned.push(NewMatch {
                category: self.category.clone(),
                team1_id: team1,
                team2_id: team2,
                referee_id: referee,
                match_time: Some(slot.start()),
            });
        }

        info!(%cycle, matches = planned.len(), "Cycle scheduled");
        Ok(planned)
    }
}

/// Plan a full category schedule from `start`, sizing the calendar with the end-date policy.
/// Slots already held by `existing` matches of any category are never handed out again.
/// Either both cycles are planned completely or an error is returned.
pub fn plan_schedule<R: Rng + ?Sized>(
    category: &Category,
    cycle_a: &[TeamId],
    cycle_b: &[TeamId],
    start: NaiveDate,
    buffer_weeks: u32,
    existing: &[Match],
    rng: &mut R,
) -> Result<Vec<NewMatch>, ScheduleError> {
    let required = required_matches(cycle_a.len(), cycle_b.len());
    let end = schedule_end_date(start, required, buffer_weeks);
    info!(%category, required, %start, %end, "Planning schedule");

    let mut scheduler = RoundRobinScheduler::new(category.clone(), start, end, existing, rng);
    let mut matches = scheduler.schedule_cycle(Cycle::A, cycle_a, cycle_b)?;
    matches.extend(scheduler.schedule_cycle(Cycle::B, cycle_b, cycle_a)?);
    Ok(matches)
}
