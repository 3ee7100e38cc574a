//! Durable queue of remote writes that failed.
//!
//! A failed push never rolls back the local write. Instead the remote
//! operation is recorded here and replayed by `Outbox::flush` with
//! exponential backoff.
//!
//! Writes to one table reach the remote in the order they were made:
//! while a table has pending entries, new writes queue behind them, and a
//! flush never replays an entry before an older one on the same table.

use crate::{
    config::SyncSettings,
    error::{LigaError, LigaResult},
    remote::RemoteBackend,
    store::{document_id, LocalStore},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// A remote write, already expressed in the remote schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OutboxOp {
    Upsert { table: String, rows: Vec<Value> },
    DeleteIds { table: String, ids: Vec<String> },
    DeleteWhere { table: String, column: String, value: String },
    DeleteAll { table: String },
}

impl OutboxOp {
    pub fn table(&self) -> &str {
        match self {
            OutboxOp::Upsert { table, .. }
            | OutboxOp::DeleteIds { table, .. }
            | OutboxOp::DeleteWhere { table, .. }
            | OutboxOp::DeleteAll { table } => table,
        }
    }

    pub fn apply(&self, remote: &dyn RemoteBackend) -> LigaResult<()> {
        match self {
            OutboxOp::Upsert { table, rows } => remote.upsert(table, rows),
            OutboxOp::DeleteIds { table, ids } => remote.delete_in(table, "id", ids),
            OutboxOp::DeleteWhere { table, column, value } => remote.delete_eq(table, column, value),
            OutboxOp::DeleteAll { table } => remote.delete_all(table),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub op_id:           String,
    pub op:              OutboxOp,
    pub attempts:        u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error:      Option<String>,
    pub created_at:      DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
    max:  Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(
            Duration::seconds(settings.outbox_base_backoff_secs.max(0)),
            Duration::seconds(settings.outbox_max_backoff_secs.max(0)),
        )
    }

    /// Wait after the `attempts`-th failure: base, 2·base, 4·base, … capped.
    pub fn delay(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(20);
        let factor = 1i32 << exp;
        (self.base * factor).min(self.max)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Replayed successfully and removed.
    pub replayed: usize,
    /// Not due yet, or held back behind a failure on the same table.
    pub deferred: usize,
    /// Attempted this flush and failed again.
    pub failed:   usize,
}

pub struct Outbox<'a> {
    store:  &'a LocalStore,
    policy: BackoffPolicy,
}

impl<'a> Outbox<'a> {
    pub fn new(store: &'a LocalStore, policy: BackoffPolicy) -> Self {
        Self { store, policy }
    }

    /// Record a remote write that just failed with `error`.
    pub fn record(&self, op: OutboxOp, error: &LigaError, now: DateTime<Utc>) -> LigaResult<()> {
        let entry = OutboxEntry {
            op_id: uuid::Uuid::new_v4().to_string(),
            next_attempt_at: now + self.policy.delay(1),
            attempts: 1,
            last_error: Some(error.to_string()),
            created_at: now,
            op,
        };
        log::warn!(
            "remote {} failed, queued {} for retry: {error}",
            entry.op.table(),
            entry.op_id
        );
        self.store.enqueue_outbox(&entry)
    }

    /// Queue a write that has not been attempted because older writes to
    /// its table are still pending. It is due as soon as they are replayed.
    pub fn enqueue_behind(&self, op: OutboxOp, now: DateTime<Utc>) -> LigaResult<()> {
        let entry = OutboxEntry {
            op_id: uuid::Uuid::new_v4().to_string(),
            next_attempt_at: now,
            attempts: 0,
            last_error: None,
            created_at: now,
            op,
        };
        log::debug!(
            "remote {}: queued {} behind pending writes",
            entry.op.table(),
            entry.op_id
        );
        self.store.enqueue_outbox(&entry)
    }

    pub fn pending(&self) -> LigaResult<Vec<OutboxEntry>> {
        self.store.all_outbox()
    }

    pub fn has_pending(&self, table: &str) -> LigaResult<bool> {
        Ok(self.store.outbox_len_for(table)? > 0)
    }

    pub fn pending_writes(&self, table: &str) -> LigaResult<PendingWrites> {
        Ok(PendingWrites::from_entries(&self.store.outbox_for(table)?))
    }

    /// Replay due entries, oldest first. An entry that is not due yet, or
    /// that fails again, holds back every later entry on its table.
    pub fn flush(&self, remote: &dyn RemoteBackend, now: DateTime<Utc>) -> LigaResult<FlushReport> {
        let mut report = FlushReport::default();
        let mut held_tables: HashSet<String> = HashSet::new();

        for entry in self.store.all_outbox()? {
            let table = entry.op.table();
            if held_tables.contains(table) {
                report.deferred += 1;
                continue;
            }
            if entry.next_attempt_at > now {
                held_tables.insert(table.to_string());
                report.deferred += 1;
                continue;
            }
            match entry.op.apply(remote) {
                Ok(()) => {
                    self.store.remove_outbox(&entry.op_id)?;
                    report.replayed += 1;
                }
                Err(e) => {
                    let attempts = entry.attempts + 1;
                    let next = now + self.policy.delay(attempts);
                    self.store
                        .reschedule_outbox(&entry.op_id, attempts, next, &e.to_string())?;
                    held_tables.insert(table.to_string());
                    report.failed += 1;
                    log::warn!(
                        "outbox replay of {} failed (attempt {attempts}), next at {next}: {e}",
                        entry.op_id
                    );
                }
            }
        }

        if report.replayed > 0 {
            log::info!("outbox: replayed {} pending remote writes", report.replayed);
        }
        Ok(report)
    }
}

/// Remote rows that a pending write will overwrite or delete. Until the
/// outbox is flushed, the remote copy of these rows is stale.
#[derive(Debug, Default)]
pub struct PendingWrites {
    ids:     HashSet<String>,
    filters: Vec<(String, String)>,
    all:     bool,
}

impl PendingWrites {
    pub fn from_entries(entries: &[OutboxEntry]) -> Self {
        let mut pending = Self::default();
        for entry in entries {
            match &entry.op {
                OutboxOp::Upsert { rows, .. } => {
                    pending.ids.extend(rows.iter().filter_map(document_id));
                }
                OutboxOp::DeleteIds { ids, .. } => pending.ids.extend(ids.iter().cloned()),
                OutboxOp::DeleteWhere { column, value, .. } => {
                    pending.filters.push((column.clone(), value.clone()));
                }
                OutboxOp::DeleteAll { .. } => pending.all = true,
            }
        }
        pending
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.ids.is_empty() && self.filters.is_empty()
    }

    /// Whether `row` (remote schema) is covered by a pending write.
    pub fn covers(&self, row: &Value) -> bool {
        if self.all {
            return true;
        }
        if document_id(row).is_some_and(|id| self.ids.contains(&id)) {
            return true;
        }
        self.filters.iter().any(|(column, value)| match row.get(column) {
            Some(Value::String(s)) => s == value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == *value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = BackoffPolicy::new(Duration::seconds(30), Duration::seconds(200));
        assert_eq!(policy.delay(1), Duration::seconds(30));
        assert_eq!(policy.delay(2), Duration::seconds(60));
        assert_eq!(policy.delay(3), Duration::seconds(120));
        assert_eq!(policy.delay(4), Duration::seconds(200));
        assert_eq!(policy.delay(40), Duration::seconds(200));
    }

    fn entry(op: OutboxOp) -> OutboxEntry {
        OutboxEntry {
            op_id: "op".into(),
            op,
            attempts: 1,
            next_attempt_at: DateTime::<Utc>::default(),
            last_error: None,
            created_at: DateTime::<Utc>::default(),
        }
    }

    #[test]
    fn pending_writes_cover_rows_by_id_and_column() {
        let pending = PendingWrites::from_entries(&[
            entry(OutboxOp::Upsert {
                table: "matches".into(),
                rows: vec![serde_json::json!({ "id": "m1" })],
            }),
            entry(OutboxOp::DeleteWhere {
                table: "matches".into(),
                column: "tournament_id".into(),
                value: "t9".into(),
            }),
        ]);
        assert!(pending.covers(&serde_json::json!({ "id": "m1", "tournament_id": "t1" })));
        assert!(pending.covers(&serde_json::json!({ "id": "m2", "tournament_id": "t9" })));
        assert!(!pending.covers(&serde_json::json!({ "id": "m3", "tournament_id": "t1" })));
        assert!(PendingWrites::from_entries(&[]).is_empty());
    }

    #[test]
    fn pending_delete_all_covers_everything() {
        let pending = PendingWrites::from_entries(&[entry(OutboxOp::DeleteAll {
            table: "players".into(),
        })]);
        assert!(pending.covers(&serde_json::json!({ "id": "anything" })));
    }

    #[test]
    fn ops_serialize_tagged() {
        let op = OutboxOp::DeleteIds {
            table: "players".into(),
            ids: vec!["p1".into()],
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "delete_ids");
        assert_eq!(op.table(), "players");
    }
}
