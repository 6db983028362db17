//! Feed item upsert (spec.md §3): `(source_id, guid)` uniqueness, with
//! incoming metadata replacing stored metadata except `full_content`,
//! which is preserved when the incoming record doesn't carry one.

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use newsgraph_core::error::CoreError;

fn sql_err(e: rusqlite::Error) -> CoreError {
    CoreError::storage(e.to_string())
}

pub struct NewFeedItem<'a> {
    pub id: &'a str,
    pub source_id: &'a str,
    pub guid: &'a str,
    pub title: &'a str,
    pub link: Option<&'a str>,
    pub pub_date: Option<&'a str>,
    pub description: Option<&'a str>,
    pub full_content: Option<&'a str>,
    pub author: Option<&'a str>,
}

/// Returns the row id (existing or newly assigned) of the upserted item.
pub fn upsert(tx: &Transaction, item: &NewFeedItem) -> Result<String, CoreError> {
    tx.query_row(
        "INSERT INTO feed_items (id, source_id, guid, title, link, pub_date, description, full_content, author, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, datetime('now'))
         ON CONFLICT(source_id, guid) DO UPDATE SET
             title = excluded.title,
             link = excluded.link,
             pub_date = excluded.pub_date,
             description = excluded.description,
             full_content = COALESCE(excluded.full_content, feed_items.full_content),
             author = excluded.author,
             fetched_at = datetime('now')
         RETURNING id",
        params![
            item.id,
            item.source_id,
            item.guid,
            item.title,
            item.link,
            item.pub_date,
            item.description,
            item.full_content,
            item.author,
        ],
        |row| row.get(0),
    )
    .map_err(sql_err)
}

pub fn unprocessed_ids(conn: &Connection, limit: usize) -> Result<Vec<String>, CoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT id FROM feed_items WHERE processing_status = 'pending' ORDER BY fetched_at ASC LIMIT ?1",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![limit as i64], |row| row.get(0))
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

pub fn get_full_content(conn: &Connection, id: &str) -> Result<Option<String>, CoreError> {
    conn.query_row(
        "SELECT full_content FROM feed_items WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
    .map_err(sql_err)
}

/// Display metadata for an article, used to attribute GraphRAG sources
/// (spec.md §4.8 step 6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArticleMeta {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub pub_date: Option<String>,
}

pub fn get_metadata(conn: &Connection, id: &str) -> Result<Option<ArticleMeta>, CoreError> {
    conn.query_row(
        "SELECT id, title, link, pub_date FROM feed_items WHERE id = ?1",
        params![id],
        |row| {
            Ok(ArticleMeta {
                id: row.get(0)?,
                title: row.get(1)?,
                link: row.get(2)?,
                pub_date: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(sql_err)
}
