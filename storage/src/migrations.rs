//! Versioned, idempotent schema migrations applied at startup.
//!
//! Each migration is one SQL batch. `schema_migrations` records which
//! versions have run; the registry applies any version greater than the
//! highest recorded one, in order, inside a single transaction per version.

use rusqlite::Connection;

use newsgraph_core::error::CoreError;

pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema",
        sql: include_str!("schema/0001_initial.sql"),
    },
];

pub fn apply_all(conn: &mut Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| CoreError::storage(format!("failed to create migrations table: {e}")))?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CoreError::storage(format!("failed to read schema version: {e}")))?;

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::storage(format!("failed to start migration tx: {e}")))?;
        tx.execute_batch(migration.sql).map_err(|e| {
            CoreError::storage(format!(
                "migration {} ({}) failed: {e}",
                migration.version, migration.description
            ))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )
        .map_err(|e| CoreError::storage(format!("failed to record migration: {e}")))?;
        tx.commit()
            .map_err(|e| CoreError::storage(format!("failed to commit migration: {e}")))?;
        tracing::info!(version = migration.version, "applied migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_all(&mut conn).unwrap();
        apply_all(&mut conn).unwrap();
        let version: i64 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, 1);
    }
}
