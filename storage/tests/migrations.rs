//! End-to-end exercises against a real SQLite file on disk (spec.md §4.1):
//! migrations apply cleanly to a fresh file and are safe to re-run against
//! an already-migrated one, and `feed_items::upsert` is idempotent under
//! its `(source_id, guid)` uniqueness rule across separate `Store::open`
//! calls against the same file.

use std::path::PathBuf;

use serial_test::serial;

use newsgraph_storage::{feed_items, Store};

fn shared_db_path() -> PathBuf {
    std::env::temp_dir().join("newsgraph-storage-integration-shared.sqlite3")
}

/// Two tests open the *same* fixed file path rather than an isolated
/// `tempfile::tempdir()`, so they must not interleave; `#[serial]` enforces
/// that within this binary.
#[test]
#[serial]
fn fresh_file_migrates_cleanly() {
    let path = shared_db_path();
    let _ = std::fs::remove_file(&path);

    let store = Store::open(&path, 4).unwrap();
    let version: i64 = store
        .read(|conn| {
            conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
                .map_err(|e| newsgraph_core::error::CoreError::storage(e.to_string()))
        })
        .unwrap();
    assert_eq!(version, 1);

    std::fs::remove_file(&path).unwrap();
}

#[test]
#[serial]
fn reopening_an_already_migrated_file_is_a_no_op() {
    let path = shared_db_path();
    let _ = std::fs::remove_file(&path);

    {
        let _store = Store::open(&path, 4).unwrap();
    }
    // Reopening re-runs `apply_all` against a file that already has every
    // migration recorded; it must not error or double-apply.
    let store = Store::open(&path, 4).unwrap();
    let migration_count: i64 = store
        .read(|conn| {
            conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
                .map_err(|e| newsgraph_core::error::CoreError::storage(e.to_string()))
        })
        .unwrap();
    assert_eq!(migration_count, 1);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn feed_item_upsert_is_idempotent_across_store_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idempotency.sqlite3");

    let first_id = {
        let store = Store::open(&path, 4).unwrap();
        store
            .write(|tx| {
                feed_items::upsert(
                    tx,
                    &feed_items::NewFeedItem {
                        id: "row-1",
                        source_id: "feed-a",
                        guid: "guid-1",
                        title: "Original title",
                        link: None,
                        pub_date: None,
                        description: None,
                        full_content: Some("original content"),
                        author: None,
                    },
                )
            })
            .unwrap()
    };

    // Re-opening the same file and upserting the same `(source_id, guid)`
    // with new metadata updates the row in place rather than duplicating
    // it, and preserves `full_content` when the incoming record omits one.
    let second_id = {
        let store = Store::open(&path, 4).unwrap();
        store
            .write(|tx| {
                feed_items::upsert(
                    tx,
                    &feed_items::NewFeedItem {
                        id: "row-2",
                        source_id: "feed-a",
                        guid: "guid-1",
                        title: "Updated title",
                        link: None,
                        pub_date: None,
                        description: None,
                        full_content: None,
                        author: None,
                    },
                )
            })
            .unwrap()
    };

    assert_eq!(first_id, second_id);

    let store = Store::open(&path, 4).unwrap();
    let count: i64 = store
        .read(|conn| {
            conn.query_row("SELECT COUNT(*) FROM feed_items", [], |row| row.get(0))
                .map_err(|e| newsgraph_core::error::CoreError::storage(e.to_string()))
        })
        .unwrap();
    assert_eq!(count, 1);

    let full_content: String = store
        .read(|conn| {
            conn.query_row(
                "SELECT full_content FROM feed_items WHERE id = ?1",
                rusqlite::params![first_id],
                |row| row.get(0),
            )
            .map_err(|e| newsgraph_core::error::CoreError::storage(e.to_string()))
        })
        .unwrap();
    assert_eq!(full_content, "original content");
}
