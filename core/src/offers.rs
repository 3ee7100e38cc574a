//! Transfer offer validation.
//!
//! Rules, in order:
//!   1. the buyer must afford the offer;
//!   2. unless the player is a free agent, the offer must reach the
//!      minimum fee (a percentage of the computed market value);
//!   3. elite reputation gate, disabled unless explicitly configured.
//!
//! A failed rule is a verdict, not an error.

use crate::{
    config::OfferRules,
    economics::market_value_for,
    model::{Club, Player},
    standings::{position_of, StandingRow},
    types::Money,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferRejection {
    InsufficientBudget { budget: Money, offer: Money },
    BelowMinimumFee { minimum: Money, offer: Money },
    ReputationTooLow { position: Option<usize>, required: usize },
}

impl fmt::Display for OfferRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferRejection::InsufficientBudget { budget, offer } => write!(
                f,
                "Presupuesto insuficiente: disponible {budget}, oferta {offer}"
            ),
            OfferRejection::BelowMinimumFee { minimum, offer } => write!(
                f,
                "La oferta ({offer}) no alcanza la oferta mínima de {minimum}"
            ),
            OfferRejection::ReputationTooLow { position, required } => match position {
                Some(p) => write!(
                    f,
                    "Reputación insuficiente: puesto {p}, se requiere top {required}"
                ),
                None => write!(
                    f,
                    "Reputación insuficiente: el club no figura en la tabla (top {required})"
                ),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferVerdict {
    Accepted,
    Rejected(OfferRejection),
}

impl OfferVerdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, OfferVerdict::Accepted)
    }

    /// User-facing reason for a rejection.
    pub fn reason(&self) -> Option<String> {
        match self {
            OfferVerdict::Accepted => None,
            OfferVerdict::Rejected(r) => Some(r.to_string()),
        }
    }
}

/// Lowest acceptable fee for a player who is not a free agent.
pub fn minimum_fee(player: &Player, rules: &OfferRules) -> Money {
    market_value_for(player.overall) * rules.min_fee_percent / 100
}

pub fn validate_offer_basics(
    player: &Player,
    buyer: &Club,
    offer: Money,
    standings: Option<&[StandingRow]>,
    rules: &OfferRules,
) -> OfferVerdict {
    if buyer.budget < offer {
        return OfferVerdict::Rejected(OfferRejection::InsufficientBudget {
            budget: buyer.budget,
            offer,
        });
    }

    if !player.is_free_agent() {
        let minimum = minimum_fee(player, rules);
        if offer < minimum {
            return OfferVerdict::Rejected(OfferRejection::BelowMinimumFee { minimum, offer });
        }
    }

    if let Some(rejection) = elite_gate(player, buyer, standings, rules) {
        return OfferVerdict::Rejected(rejection);
    }

    OfferVerdict::Accepted
}

/// Runs only when enabled and both thresholds are configured.
fn elite_gate(
    player: &Player,
    buyer: &Club,
    standings: Option<&[StandingRow]>,
    rules: &OfferRules,
) -> Option<OfferRejection> {
    let gate = &rules.elite_gate;
    if !gate.enabled {
        return None;
    }
    let (Some(min_overall), Some(required)) = (gate.min_overall, gate.max_table_position) else {
        return None;
    };
    if player.overall.unwrap_or(0) < min_overall {
        return None;
    }

    let position = standings.and_then(|s| position_of(s, &buyer.name));
    match position {
        Some(p) if p <= required => None,
        _ => Some(OfferRejection::ReputationTooLow { position, required }),
    }
}
