//! Embedding storage and similarity search for nodes and chunks, used by
//! the GraphRAG pipeline's retrieval phases (spec.md §4.8 steps 2-3).

use rusqlite::{params, Connection, Transaction};

use newsgraph_core::error::CoreError;

use crate::vector;

fn sql_err(e: rusqlite::Error) -> CoreError {
    CoreError::storage(e.to_string())
}

#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node_id: String,
    pub label: String,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub article_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub distance: f32,
}

/// Inserts or replaces a chunk's embedding (vector tables don't support
/// upsert, per spec.md §4.1: delete then insert in the same transaction).
pub fn upsert_chunk_embedding(
    tx: &Transaction,
    chunk_id: &str,
    vec: &[f32],
    model_name: &str,
) -> Result<(), CoreError> {
    tx.execute(
        "DELETE FROM chunk_embeddings WHERE chunk_id = ?1",
        params![chunk_id],
    )
    .map_err(sql_err)?;
    tx.execute(
        "INSERT INTO chunk_embeddings (chunk_id, vector, dim, model_name) VALUES (?1, ?2, ?3, ?4)",
        params![chunk_id, vector::pack(vec), vec.len() as i64, model_name],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Finds nodes whose embedding is within `max_distance` (cosine) of
/// `probe`, ascending by distance, for keyword-driven node retrieval.
pub fn search_similar_nodes(
    conn: &Connection,
    probe: &[f32],
    max_distance: f32,
    limit: usize,
) -> Result<Vec<ScoredNode>, CoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT e.node_id, n.label, e.vector FROM node_embeddings e
             JOIN hypergraph_nodes n ON n.node_id = e.node_id",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let label: String = row.get(1)?;
            let raw: Vec<u8> = row.get(2)?;
            Ok((id, label, raw))
        })
        .map_err(sql_err)?;

    let mut out = Vec::new();
    for row in rows {
        let (node_id, label, raw) = row.map_err(sql_err)?;
        let v = vector::unpack(&raw)?;
        let d = vector::cosine_distance(probe, &v);
        if d < max_distance {
            out.push(ScoredNode {
                node_id,
                label,
                distance: d,
            });
        }
    }
    out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
    out.truncate(limit);
    Ok(out)
}

/// Finds chunks whose embedding is within `max_distance` (cosine) of
/// `probe`, ascending by distance, for question-driven chunk retrieval.
pub fn search_similar_chunks(
    conn: &Connection,
    probe: &[f32],
    max_distance: f32,
    limit: usize,
) -> Result<Vec<ScoredChunk>, CoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.feed_item_id, c.chunk_index, c.content, e.vector FROM chunk_embeddings e
             JOIN article_chunks c ON c.id = e.chunk_id",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let article_id: String = row.get(1)?;
            let chunk_index: i64 = row.get(2)?;
            let content: String = row.get(3)?;
            let raw: Vec<u8> = row.get(4)?;
            Ok((id, article_id, chunk_index, content, raw))
        })
        .map_err(sql_err)?;

    let mut out = Vec::new();
    for row in rows {
        let (chunk_id, article_id, chunk_index, content, raw) = row.map_err(sql_err)?;
        let v = vector::unpack(&raw)?;
        let d = vector::cosine_distance(probe, &v);
        if d < max_distance {
            out.push(ScoredChunk {
                chunk_id,
                article_id,
                chunk_index,
                content,
                distance: d,
            });
        }
    }
    out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
    out.truncate(limit);
    Ok(out)
}

/// Loads every node's embedding, keyed by node id, for the clustering
/// pipeline's IDF-weighted pooling (spec.md §4.5) — one pass rather than a
/// query per node.
pub fn load_all_node_embeddings(
    conn: &Connection,
) -> Result<std::collections::HashMap<String, Vec<f32>>, CoreError> {
    let mut stmt = conn
        .prepare("SELECT node_id, vector FROM node_embeddings")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            let node_id: String = row.get(0)?;
            let raw: Vec<u8> = row.get(1)?;
            Ok((node_id, raw))
        })
        .map_err(sql_err)?;
    let mut out = std::collections::HashMap::new();
    for row in rows {
        let (node_id, raw) = row.map_err(sql_err)?;
        out.insert(node_id, vector::unpack(&raw)?);
    }
    Ok(out)
}

/// Chunks reachable via provenance from a set of node ids — the fallback
/// path when direct chunk-similarity search returns nothing (spec.md
/// §4.8 step 3 / §7's semantic-error fallback).
pub fn chunks_via_provenance(
    conn: &Connection,
    node_ids: &[String],
    limit: usize,
) -> Result<Vec<ScoredChunk>, CoreError> {
    if node_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = node_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT DISTINCT c.id, p.feed_item_id, p.chunk_index, c.content
         FROM article_edge_provenance p
         JOIN incidences i ON i.edge_id = p.edge_id
         JOIN article_chunks c ON c.feed_item_id = p.feed_item_id AND c.chunk_index = p.chunk_index
         WHERE i.node_id IN ({placeholders})
         LIMIT ?{}",
        node_ids.len() + 1
    );
    let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
    let limit_i64 = limit as i64;
    let params: Vec<&dyn rusqlite::ToSql> = node_ids
        .iter()
        .map(|s| s as &dyn rusqlite::ToSql)
        .chain(std::iter::once(&limit_i64 as &dyn rusqlite::ToSql))
        .collect();
    let rows = stmt
        .query_map(params.as_slice(), |row| {
            let chunk_id: String = row.get(0)?;
            let article_id: String = row.get(1)?;
            let chunk_index: i64 = row.get(2)?;
            let content: String = row.get(3)?;
            Ok(ScoredChunk {
                chunk_id,
                article_id,
                chunk_index,
                content,
                distance: 0.0,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}
