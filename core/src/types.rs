//! Shared primitive types used across the whole crate.

/// A stable, unique identifier for any stored entity.
pub type EntityId = String;

/// Currency amount in whole units.
pub type Money = i64;

/// A player's scalar skill score ("overall").
pub type Rating = u32;
