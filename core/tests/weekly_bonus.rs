//! Weekly victory bonus.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use liga_core::{
    bonus::{apply_weekly_victory_bonus, iso_week_key, WEEKLY_BONUS_MARKER},
    clock::ManualClock,
    config::SyncSettings,
    error::LigaError,
    ids::IdGenerator,
    model::{Club, Match, MatchStatus},
    store::LocalStore,
    sync::{EntitySync, SyncContext},
};
use std::sync::Arc;

const BONUS: i64 = 15_000_000;

// ── Test helpers ────────────────────────────────────────────────────────────

fn services() -> (EntitySync<Club>, EntitySync<Match>) {
    services_on(LocalStore::in_memory().unwrap())
}

fn services_on(store: LocalStore) -> (EntitySync<Club>, EntitySync<Match>) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    let ctx = SyncContext::new(
        Arc::new(store),
        None,
        Arc::new(clock),
        Arc::new(IdGenerator::seeded(3)),
        SyncSettings::default(),
    );
    (EntitySync::new(ctx.clone()), EntitySync::new(ctx))
}

fn club(id: &str, name: &str) -> Club {
    Club {
        id: id.into(),
        name: name.into(),
        budget: 100_000_000,
        ..Default::default()
    }
}

fn result(id: &str, date: NaiveDate, home: &str, away: &str, score: (u32, u32), status: MatchStatus) -> Match {
    Match {
        id: id.into(),
        tournament_id: "t1".into(),
        round: 1,
        date: Some(date),
        home_team: home.into(),
        away_team: away.into(),
        home_score: Some(score.0),
        away_score: Some(score.1),
        status,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn iso_week_key_format() {
    assert_eq!(iso_week_key(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()), "2024-W18");
    assert_eq!(iso_week_key(Utc.with_ymd_and_hms(2021, 1, 3, 0, 0, 0).unwrap()), "2020-W53");
}

/// Two wins in the trailing week credit exactly twice the bonus; a rerun
/// in the same ISO week does nothing.
#[test]
fn two_wins_credit_twice_then_noop() {
    let (clubs, matches) = services();
    clubs.update_many(&[club("a", "Club A"), club("b", "Club B")]).unwrap();
    matches
        .update_many(&[
            result("m1", day(29), "Club A", "Club B", (2, 0), MatchStatus::Finished),
            result("m2", day(26), "Club B", "Club A", (1, 3), MatchStatus::Finished),
            // Outside the window, a draw, and an unfinished match.
            result("m3", day(20), "Club A", "Club B", (4, 0), MatchStatus::Finished),
            result("m4", day(30), "Club A", "Club B", (1, 1), MatchStatus::Finished),
            result("m5", day(30), "Club B", "Club A", (5, 0), MatchStatus::Live),
        ])
        .unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let store = &clubs.context().store;

    let report = apply_weekly_victory_bonus(&clubs, &matches, store, now, BONUS)
        .unwrap()
        .expect("first run applies");
    assert_eq!(report.week, "2024-W18");
    assert_eq!(report.wins_credited, 2);
    assert_eq!(report.credited.get("a"), Some(&30_000_000));

    let a: Club = clubs.get("a").unwrap().unwrap();
    let b: Club = clubs.get("b").unwrap().unwrap();
    assert_eq!(a.budget, 130_000_000);
    assert_eq!(b.budget, 100_000_000);
    assert_eq!(store.get_meta(WEEKLY_BONUS_MARKER).unwrap().as_deref(), Some("2024-W18"));

    let again = apply_weekly_victory_bonus(&clubs, &matches, store, now + Duration::days(2), BONUS).unwrap();
    assert!(again.is_none());
    let a: Club = clubs.get("a").unwrap().unwrap();
    assert_eq!(a.budget, 130_000_000);
}

#[test]
fn next_week_runs_again() {
    let (clubs, matches) = services();
    clubs.update_many(&[club("a", "Club A"), club("b", "Club B")]).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let store = &clubs.context().store;

    assert!(apply_weekly_victory_bonus(&clubs, &matches, store, now, BONUS).unwrap().is_some());
    let next = apply_weekly_victory_bonus(&clubs, &matches, store, now + Duration::days(7), BONUS)
        .unwrap()
        .expect("new week applies");
    assert_eq!(next.week, "2024-W19");
    assert_eq!(next.wins_credited, 0);
}

/// When one credited club cannot be written, the others keep their credit
/// and the week is still marked, so a rerun pays nobody twice.
#[test]
fn failed_club_write_still_marks_the_week() {
    let path = std::env::temp_dir().join(format!("liga-bonus-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let (clubs, matches) = services_on(LocalStore::open(path.to_str().unwrap()).unwrap());
    clubs.update_many(&[club("a", "Club A"), club("b", "Club B")]).unwrap();
    matches
        .update_many(&[
            result("m1", day(29), "Club A", "Club B", (2, 0), MatchStatus::Finished),
            result("m2", day(30), "Club B", "Club A", (3, 1), MatchStatus::Finished),
        ])
        .unwrap();
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_b BEFORE UPDATE ON clubs WHEN NEW.id = 'b'
             BEGIN SELECT RAISE(ABORT, 'write rejected'); END;",
        )
        .unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let store = clubs.context().store.clone();

    let err = apply_weekly_victory_bonus(&clubs, &matches, &store, now, BONUS).unwrap_err();
    assert!(matches!(err, LigaError::PartialBatch { written: 1, failed: 1, .. }));
    assert_eq!(store.get_meta(WEEKLY_BONUS_MARKER).unwrap().as_deref(), Some("2024-W18"));
    assert_eq!(clubs.get("a").unwrap().unwrap().budget, 115_000_000);
    assert_eq!(clubs.get("b").unwrap().unwrap().budget, 100_000_000);

    let again = apply_weekly_victory_bonus(&clubs, &matches, &store, now, BONUS).unwrap();
    assert!(again.is_none());
    assert_eq!(clubs.get("a").unwrap().unwrap().budget, 115_000_000);

    drop((clubs, matches, store));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}
