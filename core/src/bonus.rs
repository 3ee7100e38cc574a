//! Weekly victory bonus.
//!
//! Once per ISO week, every club is credited a fixed amount for each win
//! in a finished match dated within the trailing seven days. Draws credit
//! nobody. The last applied week is a single global marker in the meta
//! table, so a second run in the same week does nothing.
//!
//! The marker is set as soon as any club has been credited: when some
//! club writes fail, the week still counts as applied and the failure is
//! returned to the caller.

use crate::{
    error::{LigaError, LigaResult},
    model::{Club, Match},
    store::LocalStore,
    sync::EntitySync,
    types::{EntityId, Money},
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const WEEKLY_BONUS_MARKER: &str = "weekly_bonus_last_week";
const TRAILING_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BonusReport {
    /// ISO week key, e.g. `2024-W18`.
    pub week:          String,
    pub wins_credited: usize,
    /// Club id → amount credited this run.
    pub credited:      BTreeMap<EntityId, Money>,
}

pub fn iso_week_key(at: DateTime<Utc>) -> String {
    let week = at.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

fn in_trailing_window(date: NaiveDate, today: NaiveDate) -> bool {
    date <= today && date >= today - Duration::days(TRAILING_DAYS)
}

/// Apply the bonus for the week containing `now`. Returns `None` when this
/// week was already applied.
pub fn apply_weekly_victory_bonus(
    clubs: &EntitySync<Club>,
    matches: &EntitySync<Match>,
    store: &LocalStore,
    now: DateTime<Utc>,
    amount: Money,
) -> LigaResult<Option<BonusReport>> {
    let week = iso_week_key(now);
    if store.get_meta(WEEKLY_BONUS_MARKER)?.as_deref() == Some(week.as_str()) {
        log::debug!("weekly bonus already applied for {week}");
        return Ok(None);
    }

    let today = now.date_naive();
    let mut all_clubs = clubs.list()?;
    let mut credited: BTreeMap<EntityId, Money> = BTreeMap::new();
    let mut wins_credited = 0;

    for m in matches.list()? {
        let Some(date) = m.date else { continue };
        if !in_trailing_window(date, today) {
            continue;
        }
        let Some(winner) = m.winner() else { continue };
        match all_clubs.iter_mut().find(|c| c.name == winner) {
            Some(club) => {
                club.budget += amount;
                *credited.entry(club.id.clone()).or_default() += amount;
                wins_credited += 1;
            }
            None => log::warn!("weekly bonus: winner '{winner}' of match {} is not a known club", m.id),
        }
    }

    let changed: Vec<Club> = all_clubs
        .into_iter()
        .filter(|c| credited.contains_key(&c.id))
        .collect();
    match clubs.update_many(&changed) {
        Ok(_) => store.set_meta(WEEKLY_BONUS_MARKER, &week)?,
        Err(e @ LigaError::PartialBatch { .. }) => {
            store.set_meta(WEEKLY_BONUS_MARKER, &week)?;
            log::error!("weekly bonus {week}: applied with failed club writes: {e}");
            return Err(e);
        }
        Err(e) => return Err(e),
    }

    log::info!(
        "weekly bonus {week}: {wins_credited} wins credited across {} clubs",
        credited.len()
    );
    Ok(Some(BonusReport {
        week,
        wins_credited,
        credited,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn week_keys_follow_iso_calendar() {
        // 2021-01-03 is a Sunday still in ISO week 53 of 2020.
        let at = Utc.with_ymd_and_hms(2021, 1, 3, 12, 0, 0).unwrap();
        assert_eq!(iso_week_key(at), "2020-W53");
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(iso_week_key(at), "2024-W18");
    }

    #[test]
    fn trailing_window_is_inclusive() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert!(in_trailing_window(today, today));
        assert!(in_trailing_window(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(), today));
        assert!(!in_trailing_window(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(), today));
        assert!(!in_trailing_window(NaiveDate::from_ymd_opt(2024, 5, 11).unwrap(), today));
    }
}
