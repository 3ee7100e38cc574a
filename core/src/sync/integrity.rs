//! Foreign keys that do not resolve are not errors: the entity is kept
//! and shown under a placeholder label.

use crate::model::{Match, Tournament};
use std::collections::HashMap;

pub const UNKNOWN_TOURNAMENT_LABEL: &str = "Torneo desconocido";

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatch<'a> {
    pub fixture:         &'a Match,
    pub tournament_name: &'a str,
    /// The match's tournament id did not resolve.
    pub orphaned:        bool,
}

/// Every match, in order, with its tournament's name or the placeholder.
pub fn label_matches<'a>(matches: &'a [Match], tournaments: &'a [Tournament]) -> Vec<LabeledMatch<'a>> {
    let names: HashMap<&str, &str> = tournaments
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .collect();

    matches
        .iter()
        .map(|m| match names.get(m.tournament_id.as_str()).copied() {
            Some(name) => LabeledMatch {
                fixture: m,
                tournament_name: name,
                orphaned: false,
            },
            None => LabeledMatch {
                fixture: m,
                tournament_name: UNKNOWN_TOURNAMENT_LABEL,
                orphaned: true,
            },
        })
        .collect()
}
