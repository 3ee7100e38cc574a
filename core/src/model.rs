//! Entities owned by the league: players, clubs, tournaments, matches, posts.
//!
//! Local field names are camelCase; the remote snake_case spelling lives
//! in `mapping.rs`.

use crate::types::{EntityId, Money, Rating};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// `clubId` values that mean "no club".
pub const FREE_AGENT_SENTINELS: &[&str] = &["free", "libre", "free-agent", "none"];

// ── Player ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default)]
    pub salary: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub club_id: Option<EntityId>,
    #[serde(default)]
    pub overall: Option<Rating>,
    #[serde(default)]
    pub transfer_value: Money,
    #[serde(default)]
    pub contract: Contract,
    #[serde(default)]
    pub transfer_listed: bool,
}

impl Player {
    /// No club affiliation: absent, blank, or a sentinel id.
    pub fn has_no_club(&self) -> bool {
        match self.club_id.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(id) => FREE_AGENT_SENTINELS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(id)),
        }
    }

    pub fn has_zero_transfer_value(&self) -> bool {
        self.transfer_value == 0
    }

    /// The legacy free-agent rule: no club OR a zero transfer value.
    /// Callers that only care about affiliation should use `has_no_club`.
    pub fn is_free_agent(&self) -> bool {
        self.has_no_club() || self.has_zero_transfer_value()
    }

    pub fn belongs_to(&self, club_id: &str) -> bool {
        !self.has_no_club() && self.club_id.as_deref() == Some(club_id)
    }
}

// ── Club ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub budget: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<EntityId>,
}

/// Players currently registered to `club_id`. The roster is never stored.
pub fn roster<'a, 'p: 'a>(
    club_id: &'a str,
    players: &'p [Player],
) -> impl Iterator<Item = &'p Player> + 'a {
    players.iter().filter(move |p| p.belongs_to(club_id))
}

// ── Tournament ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    #[default]
    Upcoming,
    Active,
    Finished,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub teams: Vec<String>,
    /// How many times every pair of teams meets.
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    #[serde(default)]
    pub status: TournamentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Matches embedded by older clients. Read on input, never written back;
    /// `League::load` moves them into the matches collection.
    #[serde(default, rename = "matches", skip_serializing, deserialize_with = "null_as_empty")]
    pub legacy_matches: Vec<Match>,
}

fn default_rounds() -> u32 {
    1
}

/// A cleared `matches` column arrives as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Match>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Vec<Match>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ── Match ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Live,
    Finished,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub tournament_id: EntityId,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    #[serde(default)]
    pub status: MatchStatus,
}

impl Match {
    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    /// Winning team name of a finished match. Draws and unscored
    /// matches have no winner.
    pub fn winner(&self) -> Option<&str> {
        if !self.is_finished() {
            return None;
        }
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) if h > a => Some(&self.home_team),
            (Some(h), Some(a)) if a > h => Some(&self.away_team),
            _ => None,
        }
    }
}

// ── Post ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default)]
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}
