//! Derived economics: market value and salary from a player's rating.
//!
//! Both figures come from a published schedule tabulated for ratings
//! 72..=101. Outside that domain:
//!   - below 72: scale the 72 entry linearly (`table[72] * r / 72`,
//!     rounded to the unit) and never go under the schedule's floor;
//!   - above 101: extend with the slope between the 100 and 101 entries;
//!   - no rating: the 72 entry.
//!
//! The bulk adjustments recompute every player from the schedule and
//! persist only the players whose stored figure is off by more than the
//! configured epsilon.

use crate::{
    error::LigaResult,
    model::Player,
    sync::EntitySync,
    types::{Money, Rating},
};
use serde::Serialize;

pub const TABLE_MIN_RATING: Rating = 72;
pub const TABLE_MAX_RATING: Rating = 101;
const TABLE_LEN: usize = (TABLE_MAX_RATING - TABLE_MIN_RATING + 1) as usize;

pub const MIN_MARKET_VALUE: Money = 1_000_000;
pub const MIN_SALARY: Money = 200_000;

/// Market value by rating, 72..=101.
pub const MARKET_VALUE_TABLE: [Money; TABLE_LEN] = [
    5_000_000,   // 72
    6_000_000,   // 73
    7_000_000,   // 74
    8_500_000,   // 75
    10_000_000,  // 76
    12_000_000,  // 77
    14_000_000,  // 78
    16_500_000,  // 79
    19_000_000,  // 80
    22_000_000,  // 81
    25_000_000,  // 82
    29_000_000,  // 83
    33_000_000,  // 84
    38_000_000,  // 85
    43_000_000,  // 86
    49_000_000,  // 87
    55_000_000,  // 88
    62_000_000,  // 89
    70_000_000,  // 90
    78_000_000,  // 91
    87_000_000,  // 92
    96_000_000,  // 93
    106_000_000, // 94
    117_000_000, // 95
    129_000_000, // 96
    142_000_000, // 97
    156_000_000, // 98
    171_000_000, // 99
    187_000_000, // 100
    205_000_000, // 101
];

/// Yearly salary by rating, 72..=101.
pub const SALARY_TABLE: [Money; TABLE_LEN] = [
    500_000,    // 72
    600_000,    // 73
    700_000,    // 74
    800_000,    // 75
    950_000,    // 76
    1_100_000,  // 77
    1_300_000,  // 78
    1_500_000,  // 79
    1_750_000,  // 80
    2_000_000,  // 81
    2_300_000,  // 82
    2_600_000,  // 83
    3_000_000,  // 84
    3_400_000,  // 85
    3_900_000,  // 86
    4_400_000,  // 87
    5_000_000,  // 88
    5_700_000,  // 89
    6_500_000,  // 90
    7_300_000,  // 91
    8_200_000,  // 92
    9_200_000,  // 93
    10_300_000, // 94
    11_500_000, // 95
    12_800_000, // 96
    14_200_000, // 97
    15_700_000, // 98
    17_300_000, // 99
    19_000_000, // 100
    21_000_000, // 101
];

#[derive(Debug, Clone, Copy)]
pub struct RatingSchedule {
    table: &'static [Money; TABLE_LEN],
    floor: Money,
}

pub const MARKET_VALUE: RatingSchedule = RatingSchedule {
    table: &MARKET_VALUE_TABLE,
    floor: MIN_MARKET_VALUE,
};

pub const SALARY: RatingSchedule = RatingSchedule {
    table: &SALARY_TABLE,
    floor: MIN_SALARY,
};

impl RatingSchedule {
    /// The literal schedule entry, for tabulated ratings only.
    pub fn tabulated(&self, rating: Rating) -> Option<Money> {
        if !(TABLE_MIN_RATING..=TABLE_MAX_RATING).contains(&rating) {
            return None;
        }
        Some(self.table[(rating - TABLE_MIN_RATING) as usize])
    }

    pub fn value_for(&self, rating: Option<Rating>) -> Money {
        let first = self.table[0];
        let Some(rating) = rating else {
            return first;
        };

        if rating < TABLE_MIN_RATING {
            let scaled = (first as f64 * rating as f64 / TABLE_MIN_RATING as f64).round() as Money;
            return scaled.max(self.floor);
        }
        if rating > TABLE_MAX_RATING {
            let last = self.table[TABLE_LEN - 1];
            let slope = last - self.table[TABLE_LEN - 2];
            return last + slope * Money::from(rating - TABLE_MAX_RATING);
        }
        self.table[(rating - TABLE_MIN_RATING) as usize]
    }
}

pub fn market_value_for(rating: Option<Rating>) -> Money {
    MARKET_VALUE.value_for(rating)
}

pub fn salary_for(rating: Option<Rating>) -> Money {
    SALARY.value_for(rating)
}

/// Outcome of a bulk adjustment, for the user-facing summary only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdjustmentSummary {
    pub updated: usize,
    /// Sum of the new values of the updated players.
    pub total:   Money,
}

/// Bring every stored salary in line with the salary schedule.
pub fn adjust_all_player_salaries(
    players: &EntitySync<Player>,
    epsilon: Money,
) -> LigaResult<AdjustmentSummary> {
    let summary = adjust_players(players, epsilon, SALARY, |p| &mut p.contract.salary)?;
    log::info!(
        "salary adjustment: {} players updated, total {}",
        summary.updated,
        summary.total
    );
    Ok(summary)
}

/// Bring every stored transfer value in line with the market-value schedule.
pub fn adjust_all_player_market_values(
    players: &EntitySync<Player>,
    epsilon: Money,
) -> LigaResult<AdjustmentSummary> {
    let summary = adjust_players(players, epsilon, MARKET_VALUE, |p| &mut p.transfer_value)?;
    log::info!(
        "market value adjustment: {} players updated, total {}",
        summary.updated,
        summary.total
    );
    Ok(summary)
}

fn adjust_players(
    players: &EntitySync<Player>,
    epsilon: Money,
    schedule: RatingSchedule,
    field: impl Fn(&mut Player) -> &mut Money,
) -> LigaResult<AdjustmentSummary> {
    let mut changed = Vec::new();
    let mut summary = AdjustmentSummary::default();

    for mut player in players.list()? {
        let target = schedule.value_for(player.overall);
        let stored = field(&mut player);
        if (target - *stored).abs() > epsilon {
            *stored = target;
            summary.updated += 1;
            summary.total += target;
            changed.push(player);
        }
    }

    // Only changed players are written; pushes go out in batches.
    players.update_many(&changed)?;
    Ok(summary)
}
