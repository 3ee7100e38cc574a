//! Field-name translation between the remote schema (snake_case columns)
//! and local documents (camelCase fields).
//!
//! Only the listed top-level keys are renamed; every other key passes
//! through untouched, so columns that already agree need no entry.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    /// `(remote, local)` pairs.
    pairs: &'static [(&'static str, &'static str)],
}

impl FieldMap {
    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self { pairs }
    }

    pub fn to_local(&self, row: Value) -> Value {
        rename_keys(row, self.pairs.iter().map(|(remote, local)| (*remote, *local)))
    }

    pub fn to_remote(&self, doc: Value) -> Value {
        rename_keys(doc, self.pairs.iter().map(|(remote, local)| (*local, *remote)))
    }

    /// Remote column for a local field name.
    pub fn remote_name<'a>(&self, local: &'a str) -> &'a str {
        self.pairs
            .iter()
            .find(|(_, l)| *l == local)
            .map(|(r, _)| *r)
            .unwrap_or(local)
    }
}

fn rename_keys<'a>(value: Value, renames: impl Iterator<Item = (&'a str, &'a str)>) -> Value {
    let Value::Object(mut obj) = value else {
        return value;
    };
    let mut out = Map::with_capacity(obj.len());
    for (from, to) in renames {
        if let Some(v) = obj.remove(from) {
            out.insert(to.to_string(), v);
        }
    }
    for (k, v) in obj {
        out.entry(k).or_insert(v);
    }
    Value::Object(out)
}

pub const PLAYER_FIELDS: FieldMap = FieldMap::new(&[
    ("club_id", "clubId"),
    ("transfer_value", "transferValue"),
    ("transfer_listed", "transferListed"),
]);

pub const CLUB_FIELDS: FieldMap = FieldMap::new(&[
    ("short_name", "shortName"),
    ("manager_id", "managerId"),
]);

pub const TOURNAMENT_FIELDS: FieldMap = FieldMap::new(&[
    ("start_date", "startDate"),
    ("end_date", "endDate"),
]);

pub const MATCH_FIELDS: FieldMap = FieldMap::new(&[
    ("tournament_id", "tournamentId"),
    ("home_team", "homeTeam"),
    ("away_team", "awayTeam"),
    ("home_score", "homeScore"),
    ("away_score", "awayScore"),
]);

pub const POST_FIELDS: FieldMap = FieldMap::new(&[]);
