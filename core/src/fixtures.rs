//! Round-robin fixture generation (circle method).
//!
//! Each pair of teams meets `tournament.rounds` times. Home and away swap
//! on every other leg. With an odd team count one team rests each
//! matchday. Generated matches carry no id; the match service assigns
//! ids on create.

use crate::model::{Match, MatchStatus, Tournament};
use chrono::{Duration, NaiveDate};

pub fn generate_round_robin(
    tournament: &Tournament,
    start_date: NaiveDate,
    days_between_rounds: i64,
) -> Vec<Match> {
    let mut slots: Vec<Option<&str>> = tournament.teams.iter().map(|t| Some(t.as_str())).collect();
    if slots.len() < 2 {
        return Vec::new();
    }
    if slots.len() % 2 == 1 {
        slots.push(None); // bye
    }

    let n = slots.len();
    let legs = tournament.rounds.max(1);
    let matchdays_per_leg = (n - 1) as u32;
    let mut out = Vec::with_capacity(legs as usize * matchdays_per_leg as usize * n / 2);

    for leg in 0..legs {
        let mut rotation = slots.clone();
        for day in 0..matchdays_per_leg {
            let matchday = leg * matchdays_per_leg + day + 1;
            let date = start_date + Duration::days(days_between_rounds * i64::from(matchday - 1));

            for i in 0..n / 2 {
                let (Some(a), Some(b)) = (rotation[i], rotation[n - 1 - i]) else {
                    continue;
                };
                // Alternate the fixed team's venue so nobody stays home all leg.
                let mut home_first = !(i == 0 && day % 2 == 1);
                if leg % 2 == 1 {
                    home_first = !home_first;
                }
                let (home, away) = if home_first { (a, b) } else { (b, a) };

                out.push(Match {
                    id: String::new(),
                    tournament_id: tournament.id.clone(),
                    round: matchday,
                    date: Some(date),
                    home_team: home.to_string(),
                    away_team: away.to_string(),
                    home_score: None,
                    away_score: None,
                    status: MatchStatus::Scheduled,
                });
            }

            // Keep slot 0 fixed, rotate the rest one step.
            if let Some(last) = rotation.pop() {
                rotation.insert(1, last);
            }
        }
    }
    out
}
