use super::LocalStore;
use crate::error::LigaResult;
use rusqlite::{params, OptionalExtension};

impl LocalStore {
    // ── Meta markers ──────────────────────────────────────────────

    pub fn get_meta(&self, key: &str) -> LigaResult<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> LigaResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}
