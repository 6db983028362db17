//! Connection pooling over a single SQLite file.
//!
//! One writer at a time; readers may run concurrently. `r2d2` enforces the
//! pool-size cap, `rusqlite`'s own mutex enforces single-writer semantics
//! within a connection. We additionally set `busy_timeout` so that a writer
//! waiting on another writer's transaction doesn't immediately error out.

use std::path::Path;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use newsgraph_core::error::CoreError;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Opens (creating if necessary) the database file at `path` and returns a
/// pool sized for `max_size` concurrent connections.
pub fn open_pool(path: impl AsRef<Path>, max_size: u32) -> Result<Pool, CoreError> {
    let manager = SqliteConnectionManager::file(path.as_ref()).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(15))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    });

    r2d2::Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| CoreError::storage(format!("failed to open pool: {e}")))
}

/// In-memory pool for tests: `max_size` must stay at 1, since SQLite's
/// `:memory:` databases are per-connection and a pool would otherwise hand
/// out empty, unrelated databases.
#[cfg(any(test, feature = "test-util"))]
pub fn open_memory_pool() -> Result<Pool, CoreError> {
    let manager = SqliteConnectionManager::memory();
    r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| CoreError::storage(format!("failed to open in-memory pool: {e}")))
}

pub fn get(pool: &Pool) -> Result<PooledConnection, CoreError> {
    pool.get()
        .map_err(|e| CoreError::storage(format!("failed to acquire connection: {e}")))
}

#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[allow(dead_code)]
fn _pool_is_send_sync() {
    assert_send_sync::<Connection>();
}
