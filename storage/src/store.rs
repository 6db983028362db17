//! The top-level store handle: a connection pool plus scoped
//! read/write transaction helpers.
//!
//! Matches spec.md §4.1's contract: `read(f)`/`write(f)` scoped
//! transactions, single-writer/concurrent-reader semantics enforced by
//! SQLite itself plus `busy_timeout`, and atomic per-article writes (every
//! call into `persist_extraction` runs inside one `write` transaction).

use std::path::Path;

use rusqlite::{Connection, Transaction};

use newsgraph_core::error::CoreError;

use crate::migrations;
use crate::pool::{self, Pool};

pub struct Store {
    pool: Pool,
}

impl Store {
    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self, CoreError> {
        let pool = pool::open_pool(path, max_connections)?;
        {
            let mut conn = pool::get(&pool)?;
            migrations::apply_all(&mut conn)?;
        }
        Ok(Self { pool })
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let pool = pool::open_memory_pool()?;
        {
            let mut conn = pool::get(&pool)?;
            migrations::apply_all(&mut conn)?;
        }
        Ok(Self { pool })
    }

    /// Runs `f` against a pooled read-only view of the database. Multiple
    /// readers may run concurrently.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T, CoreError>) -> Result<T, CoreError> {
        let conn = pool::get(&self.pool)?;
        f(&conn)
    }

    /// Runs `f` inside a transaction that commits on `Ok` and rolls back on
    /// `Err`. Writers are serialized by SQLite's own locking.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&Transaction) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut conn = pool::get(&self.pool)?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::storage(format!("failed to start transaction: {e}")))?;
        let result = f(&tx);
        match result {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| CoreError::storage(format!("failed to commit: {e}")))?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_applies_migrations() {
        let store = Store::open_in_memory().unwrap();
        let count: i64 = store
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
                    .map_err(|e| CoreError::storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn write_rolls_back_on_error() {
        let store = Store::open_in_memory().unwrap();
        let result: Result<(), CoreError> = store.write(|tx| {
            tx.execute(
                "INSERT INTO feed_items (id, source_id, guid, title, fetched_at) VALUES ('a','s','g','t', datetime('now'))",
                [],
            )
            .map_err(|e| CoreError::storage(e.to_string()))?;
            Err(CoreError::internal("force rollback"))
        });
        assert!(result.is_err());
        let count: i64 = store
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM feed_items", [], |r| r.get(0))
                    .map_err(|e| CoreError::storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
