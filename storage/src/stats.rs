//! Aggregate counts for the presentation façade's `get_statistics` (spec.md §6).

use rusqlite::Connection;

use newsgraph_core::error::CoreError;

fn sql_err(e: rusqlite::Error) -> CoreError {
    CoreError::storage(e.to_string())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Statistics {
    pub node_count: i64,
    pub edge_count: i64,
    pub processed_articles: i64,
    pub embedding_count: i64,
}

pub fn get_statistics(conn: &Connection) -> Result<Statistics, CoreError> {
    let node_count = conn
        .query_row("SELECT COUNT(*) FROM hypergraph_nodes", [], |r| r.get(0))
        .map_err(sql_err)?;
    let edge_count = conn
        .query_row("SELECT COUNT(*) FROM hyperedges", [], |r| r.get(0))
        .map_err(sql_err)?;
    let processed_articles = conn
        .query_row(
            "SELECT COUNT(*) FROM feed_items WHERE processing_status = 'completed'",
            [],
            |r| r.get(0),
        )
        .map_err(sql_err)?;
    let embedding_count = conn
        .query_row("SELECT COUNT(*) FROM node_embeddings", [], |r| r.get(0))
        .map_err(sql_err)?;
    Ok(Statistics {
        node_count,
        edge_count,
        processed_articles,
        embedding_count,
    })
}
