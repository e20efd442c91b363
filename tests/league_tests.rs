use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::{NaiveDate, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use volleyball_league_lambda::config::LeagueConfig;
use volleyball_league_lambda::league::{ErrorKind, League};
use volleyball_league_lambda::model::game::{Match, NewMatch};
use volleyball_league_lambda::model::status::{DisplayStatus, MatchStatus};
use volleyball_league_lambda::model::team::{Category, Cycle, Team};
use volleyball_league_lambda::model::user::User;
use volleyball_league_lambda::model::{MatchId, TeamId, UserId};
use volleyball_league_lambda::store::{MemoryStore, MemoryTx, Store, StoreError, Transaction};
use volleyball_league_lambda::workflow::ScoreSheet;

// Fixture: Team A..G (ids 1-7) play in "men", Team H..J (ids 8-10) in "women".
// Captain user ids equal their team ids; 11 is admin, 12 a member of Team A, 13 a visitor.
fn league(seed: u64) -> League<MemoryStore> {
    let body = std::fs::read_to_string("tests/sample_league.json").expect("failed to read sample_league.json");
    let store = MemoryStore::from_json(&body).expect("fixture loads");
    League::new(store, StdRng::seed_from_u64(seed), LeagueConfig::default())
}

fn men() -> Category {
    Category::new("men")
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

fn schedule_men(league: &League<MemoryStore>) -> Vec<Match> {
    league
        .generate_schedule(
            &men(),
            &names(&["Team A", "Team B", "Team C", "Team D"]),
            &names(&["Team E", "Team F", "Team G"]),
            start(),
        )
        .expect("schedule generated")
}

fn stored_matches(league: &League<MemoryStore>, category: &Category) -> Vec<Match> {
    league.store().begin().unwrap().matches_in_category(category).unwrap()
}

#[test]
fn draw_splits_odd_count_with_extra_team_in_cycle_a() {
    let league = league(1);

    let draw = league.draw_cycles(&men()).expect("draw");

    assert_eq!(draw.cycle_a.len(), 4);
    assert_eq!(draw.cycle_b.len(), 3);
    let all: HashSet<&String> = draw.cycle_a.iter().chain(&draw.cycle_b).collect();
    assert_eq!(all.len(), 7);

    let teams = league.store().begin().unwrap().teams_in_category(&men()).unwrap();
    for team in teams {
        let expected = if draw.cycle_a.contains(&team.name) { Cycle::A } else { Cycle::B };
        assert_eq!(team.cycle, Some(expected), "team {}", team.name);
    }
}

#[test]
fn draw_then_schedule() {
    let league = league(2);
    let draw = league.draw_cycles(&men()).unwrap();

    let matches = league.generate_schedule(&men(), &draw.cycle_a, &draw.cycle_b, start()).unwrap();

    assert_eq!(matches.len(), 6 + 3);
}

#[test]
fn schedule_is_persisted_with_referees_from_the_other_cycle() {
    let league = league(3);
    let matches = schedule_men(&league);

    assert_eq!(matches.len(), 9);
    assert_eq!(stored_matches(&league, &men()), matches);

    let cycle_a: HashSet<i64> = [1, 2, 3, 4].into();
    let mut busy: HashMap<NaiveDate, HashSet<i64>> = HashMap::new();
    for m in &matches {
        assert_eq!(cycle_a.contains(&m.team1_id), !cycle_a.contains(&m.referee_id), "{:?}", m);
        assert_eq!(m.status, MatchStatus::Pending);
        let day = busy.entry(m.match_time.unwrap().date()).or_default();
        for team in [m.team1_id, m.team2_id, m.referee_id] {
            assert!(day.insert(team), "team {} double-booked", team);
        }
    }
}

#[test]
fn regenerating_replaces_the_category_only() {
    let league = league(4);
    let women = Category::new("women");
    let women_matches = league
        .generate_schedule(&women, &names(&["Team H", "Team I"]), &names(&["Team J"]), start())
        .unwrap();
    assert_eq!(women_matches.len(), 1);

    let first = schedule_men(&league);
    let second = schedule_men(&league);

    assert_eq!(first.len(), second.len());
    let first_ids: HashSet<i64> = first.iter().map(|m| m.id).collect();
    assert!(second.iter().all(|m| !first_ids.contains(&m.id)), "old matches must be replaced");
    assert_eq!(stored_matches(&league, &men()).len(), 9);
    assert_eq!(stored_matches(&league, &women), women_matches);
}

#[test]
fn categories_never_share_a_slot() {
    let league = league(14);
    let men_matches = schedule_men(&league);
    let women_matches = league
        .generate_schedule(&Category::new("women"), &names(&["Team H", "Team I"]), &names(&["Team J"]), start())
        .unwrap();

    let taken: HashSet<_> = men_matches.iter().map(|m| m.match_time).collect();
    assert_eq!(taken.len(), men_matches.len());
    for m in &women_matches {
        assert!(m.match_time.is_some());
        assert!(!taken.contains(&m.match_time), "{:?} already used by men", m.match_time);
    }
}

#[test]
fn failed_run_keeps_previous_schedule() {
    let league = league(5);
    let previous = schedule_men(&league);

    // No cycle B left to referee cycle A
    let err = league
        .generate_schedule(&men(), &names(&["Team A", "Team B", "Team C"]), &[], start())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(stored_matches(&league, &men()), previous);
}

/// Store whose inserts fail, once armed, after the category has been cleared.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

struct FlakyTx<'a> {
    inner: MemoryTx<'a>,
    failing: bool,
    cleared: bool,
}

impl Store for FlakyStore {
    type Tx<'a> = FlakyTx<'a>;

    fn begin(&self) -> Result<FlakyTx<'_>, StoreError> {
        Ok(FlakyTx { inner: self.inner.begin()?, failing: self.failing.load(Ordering::SeqCst), cleared: false })
    }
}

impl Transaction for FlakyTx<'_> {
    fn teams_in_category(&self, category: &Category) -> Result<Vec<Team>, StoreError> {
        self.inner.teams_in_category(category)
    }
    fn team(&self, id: TeamId) -> Result<Option<Team>, StoreError> {
        self.inner.team(id)
    }
    fn set_team_cycle(&mut self, id: TeamId, cycle: Option<Cycle>) -> Result<(), StoreError> {
        self.inner.set_team_cycle(id, cycle)
    }
    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.inner.user(id)
    }
    fn matches(&self) -> Result<Vec<Match>, StoreError> {
        self.inner.matches()
    }
    fn matches_in_category(&self, category: &Category) -> Result<Vec<Match>, StoreError> {
        self.inner.matches_in_category(category)
    }
    fn get_match(&self, id: MatchId) -> Result<Option<Match>, StoreError> {
        self.inner.get_match(id)
    }
    fn insert_match(&mut self, new: NewMatch) -> Result<Match, StoreError> {
        if self.failing && self.cleared {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.inner.insert_match(new)
    }
    fn update_match(&mut self, game: &Match) -> Result<(), StoreError> {
        self.inner.update_match(game)
    }
    fn delete_matches_in_category(&mut self, category: &Category) -> Result<usize, StoreError> {
        self.cleared = true;
        self.inner.delete_matches_in_category(category)
    }
    fn commit(self) -> Result<(), StoreError> {
        self.inner.commit()
    }
}

#[test]
fn storage_failure_mid_run_keeps_previous_schedule() {
    let body = std::fs::read_to_string("tests/sample_league.json").expect("failed to read sample_league.json");
    let store = FlakyStore { inner: MemoryStore::from_json(&body).expect("fixture loads"), ..Default::default() };
    let league = League::new(store, StdRng::seed_from_u64(13), LeagueConfig::default());
    let cycle_a = names(&["Team A", "Team B", "Team C", "Team D"]);
    let cycle_b = names(&["Team E", "Team F", "Team G"]);
    let previous = league.generate_schedule(&men(), &cycle_a, &cycle_b, start()).expect("schedule generated");
    let stored = || league.store().inner.begin().unwrap().matches_in_category(&men()).unwrap();
    assert_eq!(stored(), previous);

    league.store().failing.store(true, Ordering::SeqCst);
    let err = league.generate_schedule(&men(), &cycle_a, &cycle_b, start()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage, "error was: {}", err);
    assert_eq!(stored(), previous, "cleared matches must come back");
}

#[test]
fn bad_team_lists_are_validation_errors() {
    let league = league(6);
    let cases = [
        (names(&["Team A", "Nobody"]), names(&["Team E"])),
        (names(&["Team A", "Team B"]), names(&["Team B"])),
        (names(&["Team H"]), names(&["Team A"])), // Team H plays in women
        (names(&[" "]), names(&["Team A"])),
    ];
    for (a, b) in cases {
        let err = league.generate_schedule(&men(), &a, &b, start()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{:?} / {:?}: {}", a, b, err);
    }
    assert!(stored_matches(&league, &men()).is_empty());
}

fn sheet() -> ScoreSheet {
    ScoreSheet::two_sets((25, 20), (25, 18), (200, 200))
}

#[test]
fn result_workflow_through_the_league() {
    let league = league(7);
    let game = schedule_men(&league).remove(0);

    let submitted = league.submit_result(game.id, &sheet(), game.referee_id).unwrap();
    assert_eq!(submitted.status, MatchStatus::WaitingConfirm);
    assert_eq!(submitted.winner_id, Some(game.team1_id));

    let once = league.confirm(game.id, game.team1_id).unwrap();
    assert_eq!(once.game.status, MatchStatus::WaitingConfirm);
    assert!(!once.settled);
    let twice = league.confirm(game.id, game.team2_id).unwrap();
    assert_eq!(twice.game.status, MatchStatus::Confirmed);
    assert!(twice.settled);

    let again = league.confirm(game.id, game.team1_id).unwrap();
    assert_eq!(again.game, twice.game);
    assert!(!again.settled, "confirming a settled match settles nothing");

    let stored = stored_matches(&league, &men()).into_iter().find(|m| m.id == game.id).unwrap();
    assert_eq!(stored, twice.game);
}

#[test]
fn unauthorized_actors_change_nothing() {
    let league = league(8);
    let game = schedule_men(&league).remove(0);

    // admin, member of Team A, visitor, and a competing captain
    for actor in [11, 12, 13, game.team1_id] {
        let err = league.submit_result(game.id, &sheet(), actor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization, "actor {}", actor);
    }
    league.submit_result(game.id, &sheet(), game.referee_id).unwrap();
    let err = league.reject(game.id, game.referee_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let stored = stored_matches(&league, &men()).into_iter().find(|m| m.id == game.id).unwrap();
    assert_eq!(stored.status, MatchStatus::WaitingConfirm);
}

#[test]
fn unknown_match_or_user_is_not_found() {
    let league = league(9);
    let game = schedule_men(&league).remove(0);

    assert_eq!(league.confirm(9999, 1).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(league.confirm(game.id, 9999).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn split_sets_need_a_third_set() {
    let league = league(10);
    let game = schedule_men(&league).remove(0);
    let split = ScoreSheet::two_sets((25, 20), (22, 25), (0, 0));

    let err = league.submit_result(game.id, &split, game.referee_id).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    let stored = stored_matches(&league, &men()).into_iter().find(|m| m.id == game.id).unwrap();
    assert_eq!(stored.status, MatchStatus::Pending);
}

#[test]
fn concurrent_confirmations_are_not_lost() {
    let league = Arc::new(league(11));
    let game = schedule_men(&league).remove(0);
    league.submit_result(game.id, &sheet(), game.referee_id).unwrap();

    let handles: Vec<_> = [game.team1_id, game.team2_id]
        .into_iter()
        .map(|captain| {
            let league = Arc::clone(&league);
            thread::spawn(move || league.confirm(game.id, captain).map(|_| ()))
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }

    let stored = stored_matches(&league, &men()).into_iter().find(|m| m.id == game.id).unwrap();
    assert_eq!(stored.status, MatchStatus::Confirmed);
    assert!(stored.team1_confirmed && stored.team2_confirmed);
}

#[test]
fn overview_derives_display_status() {
    let league = league(12);
    let matches = schedule_men(&league);
    let (first, second, third) = (&matches[0], &matches[1], &matches[2]);

    league.submit_result(first.id, &sheet(), first.referee_id).unwrap();
    league.confirm(first.id, first.team1_id).unwrap();
    league.confirm(first.id, first.team2_id).unwrap();
    league.submit_result(second.id, &sheet(), second.referee_id).unwrap();
    league.submit_result(third.id, &sheet(), third.referee_id).unwrap();
    league.reject(third.id, third.team2_id).unwrap();

    let before_season = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let after_season = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    let view = league.match_overview(before_season).unwrap();
    assert_eq!(view.len(), 9);
    let status_of = |views: &[volleyball_league_lambda::league::MatchView], id| {
        views.iter().find(|v| v.id == id).unwrap().display_status
    };
    assert_eq!(status_of(&view, first.id), DisplayStatus::Finished);
    assert_eq!(status_of(&view, second.id), DisplayStatus::PendingConfirmation);
    assert_eq!(status_of(&view, third.id), DisplayStatus::Rejected);
    let untouched = matches[3].id;
    assert_eq!(status_of(&view, untouched), DisplayStatus::NotStarted);

    let later = league.match_overview(after_season).unwrap();
    assert_eq!(status_of(&later, untouched), DisplayStatus::InProgress);

    let row = view.iter().find(|v| v.id == first.id).unwrap();
    assert!(row.team1.starts_with("Team "));
    assert!(row.winner.is_some());
    assert!(view.windows(2).all(|w| w[0].match_time <= w[1].match_time));
}

#[test]
fn team_calendar_lists_playing_and_referee_duty() {
    let league = league(13);
    let matches = schedule_men(&league);
    let team_a = 1;
    let involved = matches.iter().filter(|m| m.involves(team_a)).count();

    let ics = league.team_calendar(team_a).unwrap();

    assert!(ics.contains("BEGIN:VCALENDAR"), "calendar was: {}", ics);
    assert_eq!(ics.matches("BEGIN:VEVENT").count(), involved);
    assert!(ics.contains("Team A"), "calendar was: {}", ics);

    assert_eq!(league.team_calendar(404).unwrap_err().kind(), ErrorKind::NotFound);
}
