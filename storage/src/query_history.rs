//! Query-history CRUD (spec.md §3, §6).

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use newsgraph_core::domain::QueryHistoryEntry;
use newsgraph_core::error::CoreError;

fn sql_err(e: rusqlite::Error) -> CoreError {
    CoreError::storage(e.to_string())
}

pub struct NewQueryHistory<'a> {
    pub id: &'a str,
    pub query: &'a str,
    pub answer: Option<&'a str>,
    pub related_nodes_json: &'a str,
    pub reasoning_paths_json: &'a str,
    pub graph_paths_json: &'a str,
    pub source_articles_json: &'a str,
}

pub fn insert(tx: &Transaction, row: &NewQueryHistory) -> Result<(), CoreError> {
    tx.execute(
        "INSERT INTO query_history (id, query, answer, related_nodes_json, reasoning_paths_json, graph_paths_json, source_articles_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.id,
            row.query,
            row.answer,
            row.related_nodes_json,
            row.reasoning_paths_json,
            row.graph_paths_json,
            row.source_articles_json,
        ],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Persists the deep-analysis two-agent workflow's output (spec.md §4.9).
pub fn record_deep_analysis(
    tx: &Transaction,
    id: &str,
    synthesized_analysis: &str,
    hypotheses: &str,
) -> Result<(), CoreError> {
    tx.execute(
        "UPDATE query_history SET synthesized_analysis = ?2, hypotheses = ?3, analyzed_at = datetime('now') WHERE id = ?1",
        params![id, synthesized_analysis, hypotheses],
    )
    .map_err(sql_err)?;
    Ok(())
}

const SELECT_COLUMNS: &str = "id, query, answer, related_nodes_json, reasoning_paths_json, \
    graph_paths_json, source_articles_json, synthesized_analysis, hypotheses, analyzed_at, created_at";

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<QueryHistoryEntry> {
    Ok(QueryHistoryEntry {
        id: row.get(0)?,
        query: row.get(1)?,
        answer: row.get(2)?,
        related_nodes_json: row.get(3)?,
        reasoning_paths_json: row.get(4)?,
        graph_paths_json: row.get(5)?,
        source_articles_json: row.get(6)?,
        synthesized_analysis: row.get(7)?,
        hypotheses: row.get(8)?,
        analyzed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<QueryHistoryEntry>, CoreError> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM query_history WHERE id = ?1"),
        params![id],
        row_to_entry,
    )
    .optional()
    .map_err(sql_err)
}

pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<QueryHistoryEntry>, CoreError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM query_history ORDER BY created_at DESC LIMIT ?1"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![limit as i64], row_to_entry)
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

pub fn delete(tx: &Transaction, id: &str) -> Result<(), CoreError> {
    tx.execute("DELETE FROM query_history WHERE id = ?1", params![id])
        .map_err(sql_err)?;
    Ok(())
}
