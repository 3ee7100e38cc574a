//! League table from finished matches: 3 points a win, 1 a draw.

use crate::model::Match;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StandingRow {
    pub team:          String,
    pub played:        u32,
    pub won:           u32,
    pub drawn:         u32,
    pub lost:          u32,
    pub goals_for:     u32,
    pub goals_against: u32,
    pub points:        u32,
}

impl StandingRow {
    fn new(team: &str) -> Self {
        Self {
            team: team.to_string(),
            ..Self::default()
        }
    }

    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }

    fn record(&mut self, scored: u32, conceded: u32) {
        self.played += 1;
        self.goals_for += scored;
        self.goals_against += conceded;
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => {
                self.won += 1;
                self.points += 3;
            }
            std::cmp::Ordering::Equal => {
                self.drawn += 1;
                self.points += 1;
            }
            std::cmp::Ordering::Less => self.lost += 1,
        }
    }
}

/// Ordered by points, goal difference, goals scored, then name.
/// Teams that appear in matches but not in `teams` are still listed.
pub fn compute_standings(teams: &[String], matches: &[Match]) -> Vec<StandingRow> {
    let mut rows: Vec<StandingRow> = teams.iter().map(|t| StandingRow::new(t)).collect();
    let mut index: HashMap<String, usize> = teams
        .iter()
        .enumerate()
        .map(|(i, t)| (t.clone(), i))
        .collect();

    for m in matches.iter().filter(|m| m.is_finished()) {
        let (Some(home), Some(away)) = (m.home_score, m.away_score) else {
            continue;
        };
        for (team, scored, conceded) in [(&m.home_team, home, away), (&m.away_team, away, home)] {
            let idx = *index.entry(team.clone()).or_insert_with(|| {
                rows.push(StandingRow::new(team));
                rows.len() - 1
            });
            rows[idx].record(scored, conceded);
        }
    }

    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| b.goal_difference().cmp(&a.goal_difference()))
            .then_with(|| b.goals_for.cmp(&a.goals_for))
            .then_with(|| a.team.cmp(&b.team))
    });
    rows
}

/// 1-based table position of `team`.
pub fn position_of(standings: &[StandingRow], team: &str) -> Option<usize> {
    standings.iter().position(|r| r.team == team).map(|i| i + 1)
}
