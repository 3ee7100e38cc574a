//! Derived economics: schedule lookups and bulk adjustments.

use chrono::{TimeZone, Utc};
use liga_core::{
    clock::ManualClock,
    config::SyncSettings,
    economics::{
        adjust_all_player_market_values, adjust_all_player_salaries, market_value_for, salary_for,
    },
    ids::IdGenerator,
    model::{Contract, Player},
    store::{Collection, LocalStore},
    sync::{EntitySync, SyncContext},
};
use std::sync::Arc;

// ── Test helpers ────────────────────────────────────────────────────────────

fn player_service() -> EntitySync<Player> {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    let ctx = SyncContext::new(
        Arc::new(LocalStore::in_memory().unwrap()),
        None,
        Arc::new(clock),
        Arc::new(IdGenerator::seeded(7)),
        SyncSettings::default(),
    );
    EntitySync::new(ctx)
}

fn player(id: &str, overall: Option<u32>, transfer_value: i64, salary: i64) -> Player {
    Player {
        id: id.into(),
        name: format!("Player {id}"),
        overall,
        transfer_value,
        contract: Contract {
            salary,
            expires: None,
        },
        ..Default::default()
    }
}

// ── Schedules ───────────────────────────────────────────────────────────────

#[test]
fn schedule_spot_checks_at_table_edges() {
    assert_eq!(market_value_for(Some(72)), 5_000_000);
    assert_eq!(market_value_for(Some(101)), 205_000_000);
    assert_eq!(salary_for(Some(72)), 500_000);
    assert_eq!(salary_for(Some(101)), 21_000_000);
}

/// Below 72 the first entry scales linearly, then the floor applies.
#[test]
fn below_table_scales_down_to_floor() {
    assert_eq!(market_value_for(Some(36)), 2_500_000);
    assert_eq!(salary_for(Some(36)), 250_000);
    assert_eq!(market_value_for(Some(10)), 1_000_000);
    assert_eq!(salary_for(Some(20)), 200_000);
    assert_eq!(market_value_for(Some(0)), 1_000_000);
}

/// Above 101 the 100→101 slope continues.
#[test]
fn above_table_extrapolates_last_slope() {
    assert_eq!(market_value_for(Some(102)), 223_000_000);
    assert_eq!(market_value_for(Some(105)), 277_000_000);
    assert_eq!(salary_for(Some(103)), 25_000_000);
}

#[test]
fn missing_rating_uses_first_entry() {
    assert_eq!(market_value_for(None), 5_000_000);
    assert_eq!(salary_for(None), 500_000);
}

// ── Bulk adjustments ────────────────────────────────────────────────────────

#[test]
fn salary_adjustment_is_idempotent() {
    let players = player_service();
    let store = &players.context().store;
    store
        .put_many(
            Collection::Players,
            &[
                player("a", Some(72), 0, 100),
                player("b", Some(101), 0, 21_000_000),
                player("c", None, 0, 0),
            ],
        )
        .unwrap();

    let first = adjust_all_player_salaries(&players, 1_000).unwrap();
    assert_eq!(first.updated, 2);
    assert_eq!(first.total, 500_000 + 500_000);

    let second = adjust_all_player_salaries(&players, 1_000).unwrap();
    assert_eq!(second.updated, 0);
    assert_eq!(second.total, 0);

    let stored: Vec<Player> = players.list_local().unwrap();
    assert!(stored.iter().all(|p| p.contract.salary == salary_for(p.overall)));
}

/// Differences inside epsilon are left alone.
#[test]
fn market_value_adjustment_respects_epsilon() {
    let players = player_service();
    players
        .context()
        .store
        .put_many(
            Collection::Players,
            &[
                player("near", Some(72), 5_050_000, 0),
                player("far", Some(72), 4_000_000, 0),
            ],
        )
        .unwrap();

    let summary = adjust_all_player_market_values(&players, 100_000).unwrap();
    assert_eq!(summary.updated, 1);

    let near: Player = players.get("near").unwrap().unwrap();
    let far: Player = players.get("far").unwrap().unwrap();
    assert_eq!(near.transfer_value, 5_050_000);
    assert_eq!(far.transfer_value, 5_000_000);
}
