//! League context: loading, seed fallback, legacy migration and commands.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use liga_core::{
    clock::ManualClock,
    command::LeagueCommand,
    economics::market_value_for,
    league::{CommandOutcome, League},
    model::{Club, MatchStatus, Player, Tournament, TournamentStatus},
    offers::OfferVerdict,
    remote::{MemoryRemote, RemoteBackend},
    store::Collection,
    sync::UNKNOWN_TOURNAMENT_LABEL,
};
use serde_json::json;
use std::sync::Arc;

// ── Test helpers ────────────────────────────────────────────────────────────

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
}

fn offline_league() -> League {
    League::build_test(None, clock()).unwrap()
}

fn loaded_league() -> League {
    let mut league = offline_league();
    league.load().unwrap();
    league
}

fn seed_tournament_id(league: &League) -> String {
    league.state().tournaments[0].id.clone()
}

// ── Loading ─────────────────────────────────────────────────────────────────

#[test]
fn empty_store_loads_seed_data() {
    let league = loaded_league();
    let state = league.state();

    assert!(state.loaded);
    assert_eq!(state.clubs.len(), 4);
    assert_eq!(state.players.len(), 8);
    assert_eq!(state.tournaments.len(), 1);
    assert_eq!(state.posts.len(), 1);
    assert!(state.matches.is_empty());

    let store = &league.context().store;
    assert_eq!(store.count(Collection::Clubs).unwrap(), 4);
    assert_eq!(store.count(Collection::Players).unwrap(), 8);
}

#[test]
fn remote_rows_win_over_seed() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert_rows(
        "clubs",
        vec![json!({ "id": "r1", "name": "Remoto FC", "budget": 5, "short_name": "RFC" })],
    );
    let backend: Arc<dyn RemoteBackend> = remote.clone();
    let mut league = League::build_test(Some(backend), clock()).unwrap();
    league.load().unwrap();

    let clubs = &league.state().clubs;
    assert_eq!(clubs.len(), 1);
    assert_eq!(clubs[0].name, "Remoto FC");
    assert_eq!(clubs[0].short_name.as_deref(), Some("RFC"));
    // Seeded players were persisted locally only.
    assert!(remote.rows("players").is_empty());
}

#[test]
fn failing_remote_falls_back_to_seed() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_failing(true);
    let backend: Arc<dyn RemoteBackend> = remote.clone();
    let mut league = League::build_test(Some(backend), clock()).unwrap();
    league.load().unwrap();

    assert_eq!(league.state().clubs.len(), 4);
    assert!(league.state().loaded);
}

/// Matches embedded in an old tournament document move into the matches
/// collection and the embedded array is dropped from storage.
#[test]
fn legacy_embedded_matches_are_migrated() {
    let mut league = offline_league();
    let store = league.context().store.clone();
    store
        .put_value(
            Collection::Tournaments,
            &json!({
                "id": "old",
                "name": "Clausura 2019",
                "teams": ["A", "B"],
                "status": "finished",
                "matches": [
                    { "round": 1, "homeTeam": "A", "awayTeam": "B", "homeScore": 1, "awayScore": 0, "status": "finished" },
                    { "id": "kept", "round": 2, "homeTeam": "B", "awayTeam": "A" }
                ]
            }),
        )
        .unwrap();

    league.load().unwrap();

    let matches = &league.state().matches;
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "old-r1-A-B");
    assert_eq!(matches[0].tournament_id, "old");
    assert_eq!(matches[1].id, "kept");
    assert_eq!(store.count(Collection::Matches).unwrap(), 2);

    let stored = store.get_value(Collection::Tournaments, "old").unwrap().unwrap();
    assert!(stored.get("matches").is_none());

    // A second load does not duplicate anything.
    league.load().unwrap();
    assert_eq!(league.state().matches.len(), 2);
}

/// A migrated tournament clears its remote `matches` column, so a later
/// pull cannot bring back matches that were deleted in the meantime.
#[test]
fn migrated_matches_stay_deleted_after_next_pull() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert_rows(
        "tournaments",
        vec![json!({
            "id": "old",
            "name": "Clausura 2019",
            "teams": ["A", "B"],
            "status": "finished",
            "matches": [
                { "round": 1, "homeTeam": "A", "awayTeam": "B", "homeScore": 2, "awayScore": 1, "status": "finished" }
            ]
        })],
    );
    let clock = clock();
    let backend: Arc<dyn RemoteBackend> = remote.clone();
    let mut league = League::build_test(Some(backend), clock.clone()).unwrap();
    league.load().unwrap();

    assert_eq!(league.state().matches[0].id, "old-r1-A-B");
    let tournaments = remote.rows("tournaments");
    assert_eq!(tournaments[0]["matches"], json!(null));
    assert_eq!(tournaments[0]["name"], json!("Clausura 2019"));

    league
        .execute(LeagueCommand::GenerateFixtures {
            tournament_id: "old".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
            days_between_rounds: 7,
        })
        .unwrap();
    assert!(league.state().matches.iter().all(|m| m.id != "old-r1-A-B"));

    clock.advance(Duration::seconds(6));
    league.load().unwrap();
    let ids: Vec<&str> = league.state().matches.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 1);
    assert!(!ids.contains(&"old-r1-A-B"));
    assert!(remote.rows("matches").iter().all(|r| r["id"] != json!("old-r1-A-B")));
}

#[test]
fn orphaned_matches_get_placeholder_label() {
    let mut league = offline_league();
    league
        .context()
        .store
        .put_value(
            Collection::Matches,
            &json!({ "id": "m1", "tournamentId": "ghost", "homeTeam": "A", "awayTeam": "B" }),
        )
        .unwrap();
    league.load().unwrap();

    let labeled = league.labeled_matches();
    assert_eq!(labeled.len(), 1);
    assert!(labeled[0].orphaned);
    assert_eq!(labeled[0].tournament_name, UNKNOWN_TOURNAMENT_LABEL);
}

// ── Commands ────────────────────────────────────────────────────────────────

#[test]
fn club_mutations_rederive_open_tournament_teams() {
    let mut league = loaded_league();
    league
        .execute(LeagueCommand::CreateTournament {
            tournament: Tournament {
                name: "Copa 2023".into(),
                teams: vec!["Viejo Club".into()],
                status: TournamentStatus::Finished,
                ..Default::default()
            },
        })
        .unwrap();

    let outcome = league
        .execute(LeagueCommand::CreateClub {
            club: Club {
                name: "Nuevo Club".into(),
                budget: 50_000_000,
                ..Default::default()
            },
        })
        .unwrap();
    let CommandOutcome::Club(created) = outcome else {
        panic!("expected a club outcome");
    };
    assert!(!created.id.is_empty());

    let tournaments = &league.state().tournaments;
    assert_eq!(tournaments[0].teams.len(), 5);
    assert!(tournaments[0].teams.contains(&"Nuevo Club".to_string()));
    assert_eq!(tournaments[1].teams, vec!["Viejo Club".to_string()]);

    let stored: Tournament = league
        .context()
        .store
        .get(Collection::Tournaments, &tournaments[0].id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.teams.len(), 5);

    league
        .execute(LeagueCommand::DeleteClub { club_id: created.id })
        .unwrap();
    assert_eq!(league.state().tournaments[0].teams.len(), 4);
}

#[test]
fn fixtures_replace_and_cascade_on_delete() {
    let mut league = loaded_league();
    let tid = seed_tournament_id(&league);
    let start = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();
    let generate = || LeagueCommand::GenerateFixtures {
        tournament_id: tid.clone(),
        start_date: start,
        days_between_rounds: 7,
    };

    league.execute(generate()).unwrap();
    // Regenerating replaces rather than appends.
    let CommandOutcome::Fixtures(created) = league.execute(generate()).unwrap() else {
        panic!("expected fixtures");
    };
    assert_eq!(created.len(), 12);
    assert_eq!(league.state().matches.len(), 12);
    assert_eq!(league.context().store.count(Collection::Matches).unwrap(), 12);

    let t = &league.state().tournaments[0];
    assert_eq!(t.start_date, Some(start));
    assert_eq!(t.end_date, Some(start + Duration::days(7 * 5)));

    let outcome = league
        .execute(LeagueCommand::DeleteTournament { tournament_id: tid })
        .unwrap();
    assert_eq!(outcome, CommandOutcome::Deleted { removed: true, cascaded: 12 });
    assert!(league.state().matches.is_empty());
    assert_eq!(league.context().store.count(Collection::Matches).unwrap(), 0);
}

#[test]
fn results_feed_standings_and_weekly_bonus() {
    let mut league = loaded_league();
    let tid = seed_tournament_id(&league);
    league
        .execute(LeagueCommand::GenerateFixtures {
            tournament_id: tid.clone(),
            start_date: NaiveDate::from_ymd_opt(2024, 4, 29).unwrap(),
            days_between_rounds: 7,
        })
        .unwrap();

    let first_day: Vec<_> = league
        .state()
        .matches
        .iter()
        .filter(|m| m.round == 1)
        .cloned()
        .collect();
    assert_eq!(first_day.len(), 2);
    for m in &first_day {
        league
            .execute(LeagueCommand::RecordResult {
                match_id: m.id.clone(),
                home_score: 2,
                away_score: 1,
                is_final: true,
            })
            .unwrap();
    }

    let table = league.standings(&tid).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table[0].points, 3);
    assert_eq!(table[1].points, 3);
    assert_eq!(table[3].points, 0);

    let budgets_before: Vec<i64> = league.state().clubs.iter().map(|c| c.budget).collect();
    let CommandOutcome::Bonus(Some(report)) = league.execute(LeagueCommand::ApplyWeeklyBonus).unwrap() else {
        panic!("expected a bonus report");
    };
    assert_eq!(report.wins_credited, 2);
    let gained: i64 = league
        .state()
        .clubs
        .iter()
        .zip(&budgets_before)
        .map(|(c, before)| c.budget - before)
        .sum();
    assert_eq!(gained, 30_000_000);

    let rerun = league.execute(LeagueCommand::ApplyWeeklyBonus).unwrap();
    assert_eq!(rerun, CommandOutcome::Bonus(None));
}

#[test]
fn live_results_are_not_final() {
    let mut league = loaded_league();
    let tid = seed_tournament_id(&league);
    league
        .execute(LeagueCommand::GenerateFixtures {
            tournament_id: tid,
            start_date: NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
            days_between_rounds: 7,
        })
        .unwrap();
    let id = league.state().matches[0].id.clone();

    let CommandOutcome::Match(m) = league
        .execute(LeagueCommand::RecordResult {
            match_id: id,
            home_score: 0,
            away_score: 0,
            is_final: false,
        })
        .unwrap()
    else {
        panic!("expected a match");
    };
    assert_eq!(m.status, MatchStatus::Live);
}

#[test]
fn unknown_ids_are_not_found() {
    let mut league = loaded_league();
    let err = league
        .execute(LeagueCommand::RecordResult {
            match_id: "nope".into(),
            home_score: 1,
            away_score: 0,
            is_final: true,
        })
        .unwrap_err();
    assert!(err.to_string().contains("nope"));
    assert!(league.standings("nope").is_err());
}

#[test]
fn adjustments_refresh_player_state() {
    let mut league = loaded_league();
    let mut player = league.state().players[0].clone();
    player.contract.salary = 1;
    player.transfer_value = 1;
    league.execute(LeagueCommand::UpdatePlayer { player }).unwrap();

    let CommandOutcome::Adjusted(salaries) = league.execute(LeagueCommand::AdjustSalaries).unwrap() else {
        panic!("expected a summary");
    };
    assert_eq!(salaries.updated, 1);
    let CommandOutcome::Adjusted(values) = league.execute(LeagueCommand::AdjustMarketValues).unwrap() else {
        panic!("expected a summary");
    };
    assert_eq!(values.updated, 1);

    let p = &league.state().players[0];
    assert_eq!(p.transfer_value, market_value_for(p.overall));
    assert!(p.contract.salary > 1);
}

#[test]
fn offers_are_validated_against_state() {
    let league = loaded_league();
    let contracted: &Player = league
        .state()
        .players
        .iter()
        .find(|p| !p.is_free_agent())
        .unwrap();
    let buyer = league.state().clubs.iter().find(|c| !contracted.belongs_to(&c.id)).unwrap();
    let minimum = market_value_for(contracted.overall) * 80 / 100;

    let low = league.validate_offer(&contracted.id, &buyer.id, minimum - 1).unwrap();
    assert!(low.reason().unwrap().contains("oferta mínima"));
    let ok = league.validate_offer(&contracted.id, &buyer.id, minimum).unwrap();
    assert_eq!(ok, OfferVerdict::Accepted);

    let free_agent = league.state().players.iter().find(|p| p.has_no_club()).unwrap();
    assert!(league.validate_offer(&free_agent.id, &buyer.id, 1).unwrap().is_ok());
}

#[test]
fn roster_is_derived_from_players() {
    let league = loaded_league();
    let club_id = league.state().clubs[0].id.clone();
    let roster = league.roster(&club_id);
    assert_eq!(roster.len(), 2);
    assert!(roster.iter().all(|p| p.club_id.as_deref() == Some(club_id.as_str())));

    let detached = {
        let id = club_id.clone();
        league.roster(&id)
    };
    assert_eq!(detached.len(), 2);
}

#[test]
fn posts_are_created_and_deleted() {
    let mut league = loaded_league();
    let CommandOutcome::Post(post) = league
        .execute(LeagueCommand::CreatePost {
            post: liga_core::model::Post {
                title: "Fichaje".into(),
                ..Default::default()
            },
        })
        .unwrap()
    else {
        panic!("expected a post");
    };
    assert_eq!(league.state().posts.len(), 2);

    league
        .execute(LeagueCommand::DeletePost { post_id: post.id })
        .unwrap();
    assert_eq!(league.state().posts.len(), 1);
}

// ── Remote path ─────────────────────────────────────────────────────────────

#[test]
fn writes_reach_remote_and_failed_ones_replay() {
    let remote = Arc::new(MemoryRemote::new());
    let clock = clock();
    let backend: Arc<dyn RemoteBackend> = remote.clone();
    let mut league = League::build_test(Some(backend), clock.clone()).unwrap();
    league.load().unwrap();

    let player = league.state().players[0].clone();
    league.execute(LeagueCommand::UpdatePlayer { player }).unwrap();
    assert_eq!(remote.rows("players").len(), 1);

    remote.set_failing(true);
    let mut second = league.state().players[1].clone();
    second.name = "Renombrado".into();
    league.execute(LeagueCommand::UpdatePlayer { player: second }).unwrap();
    remote.set_failing(false);

    clock.advance(Duration::minutes(5));
    let CommandOutcome::Flushed(report) = league.execute(LeagueCommand::FlushOutbox).unwrap() else {
        panic!("expected a flush report");
    };
    assert_eq!(report.replayed, 1);
    let rows = remote.rows("players");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r["name"] == json!("Renombrado")));
}

/// Commands that list right after `load` hit the pull cooldown and must
/// fall back to local data instead of waiting.
#[test]
fn commands_right_after_load_do_not_block() {
    let remote = Arc::new(MemoryRemote::new());
    let backend: Arc<dyn RemoteBackend> = remote.clone();
    let mut league = League::build_test(Some(backend), clock()).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        league.load().unwrap();
        let salaries = league.execute(LeagueCommand::AdjustSalaries).is_ok();
        let bonus = league.execute(LeagueCommand::ApplyWeeklyBonus).is_ok();
        let _ = tx.send((salaries, bonus));
    });

    let outcome = rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("commands returned in time");
    assert_eq!(outcome, (true, true));
    assert_eq!(remote.select_calls(), 4);
}

// ── Command encoding ────────────────────────────────────────────────────────

#[test]
fn commands_decode_from_tagged_json() {
    let cmd: LeagueCommand = serde_json::from_value(json!({
        "cmd": "generate_fixtures",
        "tournament_id": "t1",
        "start_date": "2024-05-04"
    }))
    .unwrap();
    match cmd {
        LeagueCommand::GenerateFixtures {
            days_between_rounds, ..
        } => assert_eq!(days_between_rounds, 7),
        other => panic!("unexpected {other:?}"),
    }

    let cmd: LeagueCommand = serde_json::from_value(json!({ "cmd": "apply_weekly_bonus" })).unwrap();
    assert!(matches!(cmd, LeagueCommand::ApplyWeeklyBonus));
}
