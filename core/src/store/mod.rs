//! Local object store: SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Sync services call store methods; they never execute SQL directly.
//!
//! Every collection is a table of `(id, body)` rows where `body` is the
//! entity's JSON document. Writes upsert in place so a collection keeps
//! its insertion order across updates.

use crate::error::{LigaError, LigaResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

mod meta;
mod outbox;

/// Applied in order; `PRAGMA user_version` records how many have run.
/// Migrations only ever add collections, never reshape documents.
const MIGRATIONS: &[&str] = &[
    include_str!("../../../migrations/001_collections.sql"),
    include_str!("../../../migrations/002_posts_and_meta.sql"),
    include_str!("../../../migrations/003_outbox.sql"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Players,
    Clubs,
    Tournaments,
    Matches,
    Posts,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Players,
        Collection::Clubs,
        Collection::Tournaments,
        Collection::Matches,
        Collection::Posts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Players     => "players",
            Collection::Clubs       => "clubs",
            Collection::Tournaments => "tournaments",
            Collection::Matches     => "matches",
            Collection::Posts       => "posts",
        }
    }
}

pub struct LocalStore {
    conn: Mutex<Connection>,
    path: Option<String>, // None for :memory:
}

impl LocalStore {
    /// Open (or create) the store at `path` and bring its schema up to date.
    pub fn open(path: &str) -> LigaResult<Self> {
        if path == ":memory:" {
            return Self::in_memory();
        }
        let conn = Connection::open(path)?;
        // WAL only matters for real files; ignore the result elsewhere.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (used in tests).
    pub fn in_memory() -> LigaResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn conn(&self) -> LigaResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LigaError::StoreLockPoisoned)
    }

    /// Apply every migration newer than the stored schema version.
    pub fn migrate(&self) -> LigaResult<()> {
        let conn = self.conn()?;
        let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        for (idx, sql) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
            conn.execute_batch(sql)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", idx + 1))?;
            log::debug!("local store migrated to schema version {}", idx + 1);
        }
        Ok(())
    }

    pub fn schema_version(&self) -> LigaResult<i64> {
        let conn = self.conn()?;
        let version = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }

    // ── Raw documents ──────────────────────────────────────────

    pub fn get_all_values(&self, collection: Collection) -> LigaResult<Vec<Value>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, body FROM {} ORDER BY rowid ASC",
            collection.name()
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut docs = Vec::with_capacity(rows.len());
        for (id, body) in rows {
            match serde_json::from_str::<Value>(&body) {
                Ok(doc) => docs.push(doc),
                Err(e) => log::warn!("{}: skipping unreadable document {id}: {e}", collection.name()),
            }
        }
        Ok(docs)
    }

    pub fn get_value(&self, collection: Collection, id: &str) -> LigaResult<Option<Value>> {
        let conn = self.conn()?;
        let body: Option<String> = conn
            .query_row(
                &format!("SELECT body FROM {} WHERE id = ?1", collection.name()),
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(Into::into))
            .transpose()
    }

    pub fn put_value(&self, collection: Collection, item: &Value) -> LigaResult<()> {
        let conn = self.conn()?;
        write_document(&conn, collection, item)
    }

    /// Write every item independently. Successful writes stay applied even
    /// when others fail; the result is `PartialBatch` iff anything failed.
    pub fn put_many_values(&self, collection: Collection, items: &[Value]) -> LigaResult<usize> {
        let conn = self.conn()?;
        let outcomes = write_each(&conn, collection, items.iter().map(|item| Ok(item.clone())));
        batch_result(collection, &outcomes)
    }

    // ── Typed documents ────────────────────────────────────────

    /// All entities in insertion order. Rows that no longer deserialize
    /// are logged and skipped.
    pub fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> LigaResult<Vec<T>> {
        let docs = self.get_all_values(collection)?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            match serde_json::from_value::<T>(doc) {
                Ok(item) => out.push(item),
                Err(e) => log::warn!("{}: skipping malformed entity: {e}", collection.name()),
            }
        }
        Ok(out)
    }

    pub fn get<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> LigaResult<Option<T>> {
        match self.get_value(collection, id)? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub fn put<T: Serialize>(&self, collection: Collection, item: &T) -> LigaResult<()> {
        let doc = serde_json::to_value(item)?;
        self.put_value(collection, &doc)
    }

    pub fn put_many<T: Serialize>(&self, collection: Collection, items: &[T]) -> LigaResult<usize> {
        let outcomes = self.put_each(collection, items)?;
        batch_result(collection, &outcomes)
    }

    /// Like `put_many`, but reports which items were written: `true` at
    /// index `i` means `items[i]` is stored.
    pub fn put_each<T: Serialize>(&self, collection: Collection, items: &[T]) -> LigaResult<Vec<bool>> {
        let conn = self.conn()?;
        let docs = items.iter().map(|item| serde_json::to_value(item).map_err(Into::into));
        Ok(write_each(&conn, collection, docs))
    }

    // ── Removal and counts ─────────────────────────────────────

    pub fn delete(&self, collection: Collection, id: &str) -> LigaResult<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", collection.name()),
            params![id],
        )?;
        Ok(n > 0)
    }

    pub fn delete_many(&self, collection: Collection, ids: &[String]) -> LigaResult<usize> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("DELETE FROM {} WHERE id = ?1", collection.name()))?;
        let mut removed = 0;
        for id in ids {
            removed += stmt.execute(params![id])?;
        }
        Ok(removed)
    }

    pub fn count(&self, collection: Collection) -> LigaResult<u64> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", collection.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Remove every row of a collection. Returns how many were removed.
    pub fn clear(&self, collection: Collection) -> LigaResult<usize> {
        let conn = self.conn()?;
        let n = conn.execute(&format!("DELETE FROM {}", collection.name()), [])?;
        Ok(n)
    }

    pub fn ids(&self, collection: Collection) -> LigaResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} ORDER BY rowid ASC",
            collection.name()
        ))?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

/// The `id` key of a document as a string. Numeric ids are accepted.
pub fn document_id(doc: &Value) -> Option<String> {
    match doc.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn write_document(conn: &Connection, collection: Collection, doc: &Value) -> LigaResult<()> {
    let id = document_id(doc).ok_or(LigaError::MissingId {
        collection: collection.name(),
    })?;
    conn.execute(
        &format!(
            "INSERT INTO {} (id, body) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET body = excluded.body",
            collection.name()
        ),
        params![id, doc.to_string()],
    )?;
    Ok(())
}

fn write_each(
    conn: &Connection,
    collection: Collection,
    docs: impl Iterator<Item = LigaResult<Value>>,
) -> Vec<bool> {
    docs.map(|doc| match doc.and_then(|doc| write_document(conn, collection, &doc)) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("{}: batch item failed: {e}", collection.name());
                false
            }
        })
        .collect()
}

/// `Ok(written)` when every outcome is a success, `PartialBatch` otherwise.
pub fn batch_result(collection: Collection, outcomes: &[bool]) -> LigaResult<usize> {
    let written = outcomes.iter().filter(|ok| **ok).count();
    let failed = outcomes.len() - written;
    if failed > 0 {
        return Err(LigaError::PartialBatch {
            collection: collection.name(),
            written,
            failed,
        });
    }
    Ok(written)
}
