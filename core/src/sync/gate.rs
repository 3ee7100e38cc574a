//! Pull throttling: a per-entity cooldown plus single-flight.
//!
//! Best effort only. Two processes sharing a database each keep their
//! own gate.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct SyncGate {
    last_pull: Option<DateTime<Utc>>,
    in_flight: bool,
}

impl SyncGate {
    /// Claim the right to pull. Fails while another pull is running or
    /// while the previous pull started less than `cooldown` ago.
    pub fn try_begin(&mut self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        if self.in_flight {
            return false;
        }
        if let Some(last) = self.last_pull {
            if now - last < cooldown {
                return false;
            }
        }
        self.in_flight = true;
        self.last_pull = Some(now);
        true
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

/// Releases the in-flight flag when dropped, including on early return.
pub struct PullGuard<'a> {
    gate: &'a Mutex<SyncGate>,
}

impl<'a> PullGuard<'a> {
    pub fn acquire(
        gate: &'a Mutex<SyncGate>,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Option<Self> {
        let begun = gate.lock().ok()?.try_begin(now, cooldown);
        // The lock must be released before a guard exists: dropping one locks again.
        if begun {
            Some(Self { gate })
        } else {
            None
        }
    }
}

impl Drop for PullGuard<'_> {
    fn drop(&mut self) {
        match self.gate.lock() {
            Ok(mut state) => state.finish(),
            Err(poisoned) => poisoned.into_inner().finish(),
        }
    }
}
