//! In-process backend. Behaves like the hosted store (upsert by `id`,
//! insertion order kept) and can be told to fail, which is how the sync
//! layer's degraded paths are exercised.

use super::RemoteBackend;
use crate::{
    error::{LigaError, LigaResult},
    store::document_id,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct MemoryRemote {
    tables:              Mutex<HashMap<String, Vec<Value>>>,
    failing:             AtomicBool,
    bulk_delete_failing: AtomicBool,
    select_calls:        AtomicUsize,
    upsert_calls:        AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Only `delete_all` fails while set.
    pub fn set_bulk_delete_failing(&self, failing: bool) {
        self.bulk_delete_failing.store(failing, Ordering::SeqCst);
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a table's rows, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables()
            .map(|t| t.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Seed rows directly, bypassing failure injection and counters.
    pub fn insert_rows(&self, table: &str, rows: Vec<Value>) {
        if let Ok(mut tables) = self.tables() {
            let existing = tables.entry(table.to_string()).or_default();
            for row in rows {
                upsert_row(existing, row);
            }
        }
    }

    fn tables(&self) -> LigaResult<MutexGuard<'_, HashMap<String, Vec<Value>>>> {
        self.tables
            .lock()
            .map_err(|_| LigaError::Other(anyhow::anyhow!("memory remote lock poisoned")))
    }

    fn check_available(&self) -> LigaResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LigaError::Remote {
                status: 503,
                body: "memory remote unavailable".into(),
            });
        }
        Ok(())
    }
}

/// Columns present in `row` overwrite the stored ones; others are kept,
/// as with a merge-duplicates upsert.
fn upsert_row(rows: &mut Vec<Value>, row: Value) {
    let id = document_id(&row);
    match rows.iter_mut().find(|r| id.is_some() && document_id(r) == id) {
        Some(Value::Object(existing)) => {
            if let Value::Object(columns) = row {
                existing.extend(columns);
            }
        }
        Some(existing) => *existing = row,
        None => rows.push(row),
    }
}

fn column_as_string(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl RemoteBackend for MemoryRemote {
    fn select_all(&self, table: &str) -> LigaResult<Vec<Value>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.rows(table))
    }

    fn upsert(&self, table: &str, rows: &[Value]) -> LigaResult<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if rows.iter().any(|r| document_id(r).is_none()) {
            return Err(LigaError::Remote {
                status: 400,
                body: format!("{table}: row without id"),
            });
        }
        let mut tables = self.tables()?;
        let existing = tables.entry(table.to_string()).or_default();
        for row in rows {
            upsert_row(existing, row.clone());
        }
        Ok(())
    }

    fn delete_eq(&self, table: &str, column: &str, value: &str) -> LigaResult<()> {
        self.check_available()?;
        let mut tables = self.tables()?;
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|r| column_as_string(r, column).as_deref() != Some(value));
        }
        Ok(())
    }

    fn delete_in(&self, table: &str, column: &str, values: &[String]) -> LigaResult<()> {
        self.check_available()?;
        let mut tables = self.tables()?;
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|r| match column_as_string(r, column) {
                Some(v) => !values.contains(&v),
                None => true,
            });
        }
        Ok(())
    }

    fn delete_all(&self, table: &str) -> LigaResult<()> {
        self.check_available()?;
        if self.bulk_delete_failing.load(Ordering::SeqCst) {
            return Err(LigaError::Remote {
                status: 400,
                body: format!("{table}: bulk delete rejected"),
            });
        }
        let mut tables = self.tables()?;
        tables.remove(table);
        Ok(())
    }

    fn count(&self, table: &str) -> LigaResult<u64> {
        self.check_available()?;
        Ok(self.rows(table).len() as u64)
    }
}
