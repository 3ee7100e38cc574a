//! Remote backend client: row-oriented access to the hosted relational
//! store.
//!
//! RULE: nothing above the sync layer talks to a `RemoteBackend`
//! directly, and nothing calls one unless the `use_remote` flag is on.
//! Rows crossing this boundary use the remote (snake_case) schema.

mod memory;
mod postgrest;

pub use memory::MemoryRemote;
pub use postgrest::PostgrestClient;

use crate::error::LigaResult;
use serde_json::Value;

pub trait RemoteBackend: Send + Sync {
    /// Every row of `table`.
    fn select_all(&self, table: &str) -> LigaResult<Vec<Value>>;

    /// Insert or overwrite rows, keyed by their `id` column.
    fn upsert(&self, table: &str, rows: &[Value]) -> LigaResult<()>;

    /// Delete rows whose `column` equals `value`.
    fn delete_eq(&self, table: &str, column: &str, value: &str) -> LigaResult<()>;

    /// Delete rows whose `column` is one of `values`.
    fn delete_in(&self, table: &str, column: &str, values: &[String]) -> LigaResult<()>;

    /// Delete every row of `table`.
    fn delete_all(&self, table: &str) -> LigaResult<()>;

    fn count(&self, table: &str) -> LigaResult<u64>;
}
