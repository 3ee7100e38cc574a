//! Liga Master core: local-first league data with optional remote sync.

pub mod bonus;
pub mod clock;
pub mod command;
pub mod config;
pub mod economics;
pub mod error;
pub mod fixtures;
pub mod ids;
pub mod league;
pub mod mapping;
pub mod model;
pub mod offers;
pub mod remote;
pub mod seed;
pub mod standings;
pub mod store;
pub mod sync;
pub mod types;
