use crate::{
    model::{Club, Player, Post, Tournament},
    types::EntityId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Every mutation of the league goes through one of these.
/// Variants are only ever added.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum LeagueCommand {
    // ── Clubs ─────────────────────────────────────
    CreateClub { club: Club },
    UpdateClub { club: Club },
    DeleteClub { club_id: EntityId },

    // ── Players ───────────────────────────────────
    CreatePlayer { player: Player },
    UpdatePlayer { player: Player },
    DeletePlayer { player_id: EntityId },

    // ── Tournaments and matches ───────────────────
    CreateTournament { tournament: Tournament },
    UpdateTournament { tournament: Tournament },
    DeleteTournament { tournament_id: EntityId },
    GenerateFixtures {
        tournament_id: EntityId,
        start_date: NaiveDate,
        #[serde(default = "default_days_between_rounds")]
        days_between_rounds: i64,
    },
    RecordResult {
        match_id: EntityId,
        home_score: u32,
        away_score: u32,
        #[serde(default = "default_final")]
        is_final: bool,
    },

    // ── News ──────────────────────────────────────
    CreatePost { post: Post },
    DeletePost { post_id: EntityId },

    // ── Economics and sync ────────────────────────
    AdjustSalaries,
    AdjustMarketValues,
    ApplyWeeklyBonus,
    FlushOutbox,
}

fn default_days_between_rounds() -> i64 {
    7
}

fn default_final() -> bool {
    true
}
