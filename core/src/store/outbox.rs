use super::LocalStore;
use crate::{error::LigaResult, sync::outbox::{OutboxEntry, OutboxOp}};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Params, Row};

impl LocalStore {
    // ── Outbox ────────────────────────────────────────────────────

    pub fn enqueue_outbox(&self, entry: &OutboxEntry) -> LigaResult<()> {
        let payload = serde_json::to_string(&entry.op)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO outbox (
                op_id, collection, payload, attempts, next_attempt_at, last_error, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.op_id,
                entry.op.table(),
                payload,
                entry.attempts as i64,
                entry.next_attempt_at.timestamp(),
                entry.last_error,
                entry.created_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Every pending entry, oldest first.
    pub fn all_outbox(&self) -> LigaResult<Vec<OutboxEntry>> {
        self.query_outbox(
            "SELECT op_id, payload, attempts, next_attempt_at, last_error, created_at
             FROM outbox ORDER BY created_at ASC, rowid ASC",
            [],
        )
    }

    /// Pending entries for one remote table, oldest first.
    pub fn outbox_for(&self, table: &str) -> LigaResult<Vec<OutboxEntry>> {
        self.query_outbox(
            "SELECT op_id, payload, attempts, next_attempt_at, last_error, created_at
             FROM outbox WHERE collection = ?1 ORDER BY created_at ASC, rowid ASC",
            params![table],
        )
    }

    pub fn remove_outbox(&self, op_id: &str) -> LigaResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM outbox WHERE op_id = ?1", params![op_id])?;
        Ok(())
    }

    pub fn reschedule_outbox(
        &self,
        op_id: &str,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> LigaResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE outbox SET attempts = ?1, next_attempt_at = ?2, last_error = ?3
             WHERE op_id = ?4",
            params![attempts as i64, next_attempt_at.timestamp(), last_error, op_id],
        )?;
        Ok(())
    }

    pub fn outbox_len(&self) -> LigaResult<u64> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn outbox_len_for(&self, table: &str) -> LigaResult<u64> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM outbox WHERE collection = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    fn query_outbox<P: Params>(&self, sql: &str, args: P) -> LigaResult<Vec<OutboxEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, outbox_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<OutboxOp>(&row.payload) {
                Ok(op) => entries.push(OutboxEntry {
                    op_id: row.op_id,
                    op,
                    attempts: row.attempts,
                    next_attempt_at: row.next_attempt_at,
                    last_error: row.last_error,
                    created_at: row.created_at,
                }),
                Err(e) => log::warn!("outbox: skipping unreadable entry {}: {e}", row.op_id),
            }
        }
        Ok(entries)
    }
}

struct OutboxRow {
    op_id:           String,
    payload:         String,
    attempts:        u32,
    next_attempt_at: DateTime<Utc>,
    last_error:      Option<String>,
    created_at:      DateTime<Utc>,
}

fn outbox_row(row: &Row<'_>) -> rusqlite::Result<OutboxRow> {
    Ok(OutboxRow {
        op_id: row.get(0)?,
        payload: row.get(1)?,
        attempts: row.get::<_, i64>(2)?.max(0) as u32,
        next_attempt_at: from_unix(row.get(3)?),
        last_error: row.get(4)?,
        created_at: from_unix(row.get(5)?),
    })
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}
