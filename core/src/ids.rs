//! Entity identifier generation.
//!
//! Identifiers are `<unix-millis>-<9 base36 chars>`. Uniqueness is
//! probabilistic only; two creates in the same millisecond collide with
//! probability 36^-9.
//!
//! All randomness flows through one `Pcg64Mcg` stream so tests can pin
//! the seed and get reproducible identifiers.

use chrono::{DateTime, Utc};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::sync::Mutex;

const SUFFIX_LEN: usize = 9;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub struct IdGenerator {
    inner: Mutex<Pcg64Mcg>,
}

impl IdGenerator {
    /// Deterministic generator for tests and replayable tooling.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(Pcg64Mcg::seed_from_u64(seed)),
        }
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(Pcg64Mcg::from_entropy()),
        }
    }

    pub fn next_id(&self, now: DateTime<Utc>) -> String {
        let mut suffix = String::with_capacity(SUFFIX_LEN);
        let mut rng = match self.inner.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        for _ in 0..SUFFIX_LEN {
            let idx = (rng.next_u64() % ALPHABET.len() as u64) as usize;
            suffix.push(ALPHABET[idx] as char);
        }
        format!("{}-{suffix}", now.timestamp_millis())
    }
}
