//! Per-entity sync services.
//!
//! Each service reconciles one local collection with its (optional)
//! remote table and gives the league context a single read/write
//! contract:
//!
//!   list   → pull remote (gated) → map fields → merge → persist → return
//!   create → new id → local put → push
//!   update → local put → push
//!   delete → local delete → push delete
//!
//! RULES:
//!   - Local writes happen first and are never rolled back.
//!   - Remote failures are logged and queued in the outbox, never raised.
//!   - While a table has queued writes, new writes queue behind them and
//!     pulled rows they cover keep their local version.
//!   - Remote reads that fail degrade to the local collection.

pub mod entities;
pub mod gate;
pub mod integrity;
pub mod merge;
pub mod outbox;

pub use entities::SyncEntity;
pub use integrity::{label_matches, LabeledMatch, UNKNOWN_TOURNAMENT_LABEL};
pub use merge::merge_by_key;
pub use outbox::{BackoffPolicy, FlushReport, Outbox, OutboxEntry, OutboxOp, PendingWrites};

use crate::{
    clock::Clock,
    config::SyncSettings,
    error::{LigaError, LigaResult},
    ids::IdGenerator,
    remote::RemoteBackend,
    store::{batch_result, document_id, LocalStore},
};
use chrono::Duration;
use gate::{PullGuard, SyncGate};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

/// Everything the sync services share. Cheap to clone.
#[derive(Clone)]
pub struct SyncContext {
    pub store:    Arc<LocalStore>,
    /// `None` when the remote feature flag is off.
    pub remote:   Option<Arc<dyn RemoteBackend>>,
    pub clock:    Arc<dyn Clock>,
    pub ids:      Arc<IdGenerator>,
    pub settings: SyncSettings,
}

impl SyncContext {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Option<Arc<dyn RemoteBackend>>,
        clock: Arc<dyn Clock>,
        ids: Arc<IdGenerator>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            remote,
            clock,
            ids,
            settings,
        }
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub fn outbox(&self) -> Outbox<'_> {
        Outbox::new(&self.store, BackoffPolicy::from_settings(&self.settings))
    }

    /// Replay due outbox entries. A no-op when the remote is disabled.
    pub fn flush_outbox(&self) -> LigaResult<FlushReport> {
        match self.remote.as_deref() {
            Some(remote) => self.outbox().flush(remote, self.clock.now()),
            None => Ok(FlushReport::default()),
        }
    }

    fn cooldown(&self) -> Duration {
        Duration::seconds(self.settings.cooldown_secs as i64)
    }
}

pub struct EntitySync<T> {
    ctx:     SyncContext,
    gate:    Mutex<SyncGate>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: SyncEntity> EntitySync<T> {
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            gate: Mutex::new(SyncGate::default()),
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    fn collection_name(&self) -> &'static str {
        T::COLLECTION.name()
    }

    fn remote_target(&self) -> Option<(&dyn RemoteBackend, &'static str)> {
        let table = T::REMOTE_TABLE?;
        let remote = self.ctx.remote.as_deref()?;
        Some((remote, table))
    }

    // ── Reads ──────────────────────────────────────────────────

    /// Merge-on-read listing. Falls back to the local collection when the
    /// remote is disabled, throttled or failing.
    pub fn list(&self) -> LigaResult<Vec<T>> {
        let local: Vec<T> = self.ctx.store.get_all(T::COLLECTION)?;
        let Some(remote_items) = self.pull_remote() else {
            return Ok(local);
        };

        let pulled = remote_items.len();
        let merged = merge_by_key(local, remote_items, |item: &T| item.id().to_string());
        if let Err(e) = self.ctx.store.put_many(T::COLLECTION, &merged) {
            log::warn!("{}: persisting merged rows failed: {e}", self.collection_name());
        }
        log::debug!(
            "{}: merged {pulled} remote rows, {} total",
            self.collection_name(),
            merged.len()
        );
        Ok(merged)
    }

    pub fn list_local(&self) -> LigaResult<Vec<T>> {
        self.ctx.store.get_all(T::COLLECTION)
    }

    pub fn get(&self, id: &str) -> LigaResult<Option<T>> {
        self.ctx.store.get(T::COLLECTION, id)
    }

    fn pull_remote(&self) -> Option<Vec<T>> {
        let (remote, table) = self.remote_target()?;
        let Some(_guard) = PullGuard::acquire(&self.gate, self.ctx.clock.now(), self.ctx.cooldown())
        else {
            log::debug!("{table}: remote pull skipped (cooldown or already in flight)");
            return None;
        };

        let mut rows = match remote.select_all(table) {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("{table}: remote pull failed, serving local data: {e}");
                return None;
            }
        };

        match self.ctx.outbox().pending_writes(table) {
            Ok(pending) if !pending.is_empty() => {
                let before = rows.len();
                rows.retain(|row| !pending.covers(row));
                log::debug!(
                    "{table}: {} pulled rows kept local behind queued writes",
                    before - rows.len()
                );
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("{table}: cannot read outbox, serving local data: {e}");
                return None;
            }
        }

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<T>(T::FIELDS.to_local(row)) {
                Ok(item) if !item.id().trim().is_empty() => items.push(item),
                Ok(_) => log::warn!("{table}: ignoring remote row without id"),
                Err(e) => log::warn!("{table}: ignoring malformed remote row: {e}"),
            }
        }
        Some(items)
    }

    // ── Writes ─────────────────────────────────────────────────

    /// Store a new entity under a freshly generated id.
    pub fn create(&self, mut item: T) -> LigaResult<T> {
        item.set_id(self.ctx.ids.next_id(self.ctx.clock.now()));
        self.ctx.store.put(T::COLLECTION, &item)?;
        self.push_upsert(std::slice::from_ref(&item));
        Ok(item)
    }

    pub fn create_many(&self, mut items: Vec<T>) -> LigaResult<Vec<T>> {
        let now = self.ctx.clock.now();
        for item in &mut items {
            item.set_id(self.ctx.ids.next_id(now));
        }
        self.ctx.store.put_many(T::COLLECTION, &items)?;
        self.push_upsert(&items);
        Ok(items)
    }

    /// Overwrite the stored entity with the same id.
    pub fn update(&self, item: T) -> LigaResult<T> {
        self.require_id(&item)?;
        self.ctx.store.put(T::COLLECTION, &item)?;
        self.push_upsert(std::slice::from_ref(&item));
        Ok(item)
    }

    /// Overwrite many entities, keeping their ids, and push them in
    /// batches of `push_batch_size`. Only items written locally are pushed;
    /// the others are reported through `PartialBatch`.
    pub fn update_many(&self, items: &[T]) -> LigaResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let outcomes = self.ctx.store.put_each(T::COLLECTION, items)?;
        let written: Vec<T> = items
            .iter()
            .zip(&outcomes)
            .filter(|(_, ok)| **ok)
            .map(|(item, _)| item.clone())
            .collect();
        self.push_upsert(&written);
        batch_result(T::COLLECTION, &outcomes)
    }

    /// Persist and push items as they are. Only items without an id get a
    /// fresh one.
    pub fn upsert_local_and_remote(&self, mut items: Vec<T>) -> LigaResult<Vec<T>> {
        let now = self.ctx.clock.now();
        for item in items.iter_mut().filter(|i| i.id().trim().is_empty()) {
            item.set_id(self.ctx.ids.next_id(now));
        }
        self.ctx.store.put_many(T::COLLECTION, &items)?;
        self.push_upsert(&items);
        Ok(items)
    }

    pub fn delete(&self, id: &str) -> LigaResult<bool> {
        let removed = self.ctx.store.delete(T::COLLECTION, id)?;
        if let Some((_, table)) = self.remote_target() {
            self.push(OutboxOp::DeleteIds {
                table: table.to_string(),
                ids: vec![id.to_string()],
            });
        }
        Ok(removed)
    }

    /// Delete every entity whose local `field` equals `value`, locally and
    /// remotely (e.g. every match of one tournament).
    pub fn delete_where(&self, field: &str, value: &str) -> LigaResult<usize> {
        let ids: Vec<String> = self
            .ctx
            .store
            .get_all_values(T::COLLECTION)?
            .iter()
            .filter(|doc| doc.get(field).and_then(Value::as_str) == Some(value))
            .filter_map(document_id)
            .collect();
        let removed = self.ctx.store.delete_many(T::COLLECTION, &ids)?;

        if let Some((_, table)) = self.remote_target() {
            self.push(OutboxOp::DeleteWhere {
                table: table.to_string(),
                column: T::FIELDS.remote_name(field).to_string(),
                value: value.to_string(),
            });
        }
        Ok(removed)
    }

    /// Empty the collection locally, then remotely. A rejected remote bulk
    /// delete falls back to deleting the known ids one list at a time.
    pub fn clear_all(&self) -> LigaResult<usize> {
        let ids = self.ctx.store.ids(T::COLLECTION)?;
        let removed = self.ctx.store.clear(T::COLLECTION)?;

        let Some((remote, table)) = self.remote_target() else {
            return Ok(removed);
        };
        let op = OutboxOp::DeleteAll {
            table: table.to_string(),
        };
        if self.queue_behind_pending(&op) {
            return Ok(removed);
        }
        if let Err(bulk_err) = remote.delete_all(table) {
            log::warn!("{table}: remote bulk delete failed, retrying by id: {bulk_err}");
            if let Err(e) = remote.delete_in(table, "id", &ids) {
                log::warn!("{table}: remote delete failed, remote and local may now disagree: {e}");
                self.record_failure(op, &e);
            }
        }
        Ok(removed)
    }

    // ── Remote push ────────────────────────────────────────────

    fn require_id(&self, item: &T) -> LigaResult<()> {
        if item.id().trim().is_empty() {
            return Err(LigaError::MissingId {
                collection: self.collection_name(),
            });
        }
        Ok(())
    }

    fn push_upsert(&self, items: &[T]) {
        let Some((_, table)) = self.remote_target() else {
            return;
        };
        let rows: Vec<Value> = items
            .iter()
            .filter_map(|item| match item.to_remote_row() {
                Ok(row) => Some(row),
                Err(e) => {
                    log::error!("{table}: cannot encode row for push: {e}");
                    None
                }
            })
            .collect();

        for chunk in rows.chunks(self.ctx.settings.push_batch_size.max(1)) {
            self.push(OutboxOp::Upsert {
                table: table.to_string(),
                rows: chunk.to_vec(),
            });
        }
    }

    fn push(&self, op: OutboxOp) {
        let Some((remote, _)) = self.remote_target() else {
            return;
        };
        if self.queue_behind_pending(&op) {
            return;
        }
        if let Err(e) = op.apply(remote) {
            log::error!("{}: remote push failed: {e}", op.table());
            self.record_failure(op, &e);
        }
    }

    /// Queue `op` without sending it when older writes to its table are
    /// still pending. Returns whether it was queued.
    fn queue_behind_pending(&self, op: &OutboxOp) -> bool {
        let outbox = self.ctx.outbox();
        match outbox.has_pending(op.table()) {
            Ok(false) => false,
            Ok(true) => match outbox.enqueue_behind(op.clone(), self.ctx.clock.now()) {
                Ok(()) => true,
                Err(e) => {
                    log::error!("{}: could not queue remote write, pushing directly: {e}", op.table());
                    false
                }
            },
            Err(e) => {
                log::warn!("{}: cannot read outbox, pushing directly: {e}", op.table());
                false
            }
        }
    }

    fn record_failure(&self, op: OutboxOp, error: &LigaError) {
        if let Err(store_err) = self.ctx.outbox().record(op, error, self.ctx.clock.now()) {
            log::error!(
                "{}: could not queue failed remote write: {store_err}",
                self.collection_name()
            );
        }
    }
}
