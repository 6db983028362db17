//! Article → hypergraph persistence (spec.md §4.2), node merging (§4.3),
//! and the CRUD primitives both are built from.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use newsgraph_core::chunking::chunk_text;
use newsgraph_core::domain::{new_id, ExtractedHypergraph, IncidenceRole};
use newsgraph_core::edge_id::{ingest_relation, parse_chunk_id_field};
use newsgraph_core::error::CoreError;

use crate::vector;

fn sql_err(e: rusqlite::Error) -> CoreError {
    CoreError::storage(e.to_string())
}

fn role_str(role: IncidenceRole) -> &'static str {
    match role {
        IncidenceRole::Source => "source",
        IncidenceRole::Target => "target",
        IncidenceRole::Member => "member",
    }
}

pub fn upsert_chunk(
    tx: &Transaction,
    article_id: &str,
    index: i64,
    content: &str,
) -> Result<String, CoreError> {
    let id = new_id();
    tx.query_row(
        "INSERT INTO article_chunks (id, feed_item_id, chunk_index, content)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(feed_item_id, chunk_index) DO UPDATE SET content = excluded.content
         RETURNING id",
        params![id, article_id, index, content],
        |row| row.get(0),
    )
    .map_err(sql_err)
}

pub fn upsert_node(tx: &Transaction, node_id: &str, label: &str) -> Result<(), CoreError> {
    tx.execute(
        "INSERT INTO hypergraph_nodes (node_id, label) VALUES (?1, ?2)
         ON CONFLICT(node_id) DO UPDATE SET label = excluded.label",
        params![node_id, label],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn upsert_edge(
    tx: &Transaction,
    edge_id: &str,
    label: &str,
    source_chunk_id: Option<&str>,
) -> Result<(), CoreError> {
    tx.execute(
        "INSERT INTO hyperedges (edge_id, label, source_chunk_id) VALUES (?1, ?2, ?3)
         ON CONFLICT(edge_id) DO UPDATE SET label = excluded.label, source_chunk_id = excluded.source_chunk_id",
        params![edge_id, label, source_chunk_id],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn upsert_incidence(
    tx: &Transaction,
    edge_id: &str,
    node_id: &str,
    role: IncidenceRole,
    position: i64,
) -> Result<(), CoreError> {
    tx.execute(
        "INSERT INTO incidences (edge_id, node_id, role, position) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(edge_id, node_id, role) DO UPDATE SET position = excluded.position",
        params![edge_id, node_id, role_str(role), position],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn upsert_provenance(
    tx: &Transaction,
    edge_id: &str,
    feed_item_id: &str,
    chunk_index: i64,
    chunk_text: Option<&str>,
) -> Result<(), CoreError> {
    tx.execute(
        "INSERT INTO article_edge_provenance (edge_id, feed_item_id, chunk_index, chunk_text)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(edge_id, feed_item_id, chunk_index) DO UPDATE SET chunk_text = excluded.chunk_text",
        params![edge_id, feed_item_id, chunk_index, chunk_text],
    )
    .map_err(sql_err)?;
    Ok(())
}

fn node_embedding_exists(tx: &Transaction, node_id: &str) -> Result<bool, CoreError> {
    tx.query_row(
        "SELECT 1 FROM node_embeddings WHERE node_id = ?1",
        params![node_id],
        |_| Ok(()),
    )
    .optional()
    .map_err(sql_err)
    .map(|r| r.is_some())
}

fn upsert_node_embedding(
    tx: &Transaction,
    node_id: &str,
    vec: &[f32],
    model_name: &str,
) -> Result<(), CoreError> {
    tx.execute(
        "DELETE FROM node_embeddings WHERE node_id = ?1",
        params![node_id],
    )
    .map_err(sql_err)?;
    tx.execute(
        "INSERT INTO node_embeddings (node_id, vector, dim, model_name) VALUES (?1, ?2, ?3, ?4)",
        params![node_id, vector::pack(vec), vec.len() as i64, model_name],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Persists one article's extracted hypergraph atomically (spec.md §4.2).
///
/// Order within the transaction: chunks → nodes → edges → incidences →
/// provenance → embeddings, matching §5's ordering guarantee.
/// `chunk_embeddings`, if provided, must be the same length and order as
/// the chunks `chunk_text(full_content)` produces; pass an empty slice to
/// skip chunk embedding (e.g. when re-persisting without a live embedder).
pub fn persist_extraction(
    tx: &Transaction,
    article_id: &str,
    full_content: &str,
    extracted: &ExtractedHypergraph,
    embedding_model: &str,
    chunk_embeddings: &[Vec<f32>],
) -> Result<i64, CoreError> {
    let chunks = chunk_text(full_content);
    let mut chunk_ids: Vec<String> = Vec::with_capacity(chunks.len());
    for (index, text) in chunks.iter().enumerate() {
        chunk_ids.push(upsert_chunk(tx, article_id, index as i64, text)?);
    }

    if !chunk_embeddings.is_empty() {
        for (chunk_id, vec) in chunk_ids.iter().zip(chunk_embeddings.iter()) {
            crate::embeddings::upsert_chunk_embedding(tx, chunk_id, vec, embedding_model)?;
        }
    }

    let metadata_by_edge: HashMap<&str, &newsgraph_core::domain::ExtractedEdgeMetadata> =
        extracted
            .metadata
            .iter()
            .map(|m| (m.edge.as_str(), m))
            .collect();

    for (edge_id, labels) in &extracted.incidence_dict {
        let meta = metadata_by_edge.get(edge_id.as_str()).copied();
        let relation = ingest_relation(edge_id);

        let chunk_index = meta.and_then(|m| parse_chunk_id_field(&m.chunk_id));
        let source_chunk_id = chunk_index
            .and_then(|idx| chunk_ids.get(idx as usize))
            .map(String::as_str);

        upsert_edge(tx, edge_id, &relation, source_chunk_id)?;

        for (position, label) in labels.iter().enumerate() {
            upsert_node(tx, label, label)?;

            let role = match meta {
                Some(m) if m.source.contains(label) => IncidenceRole::Source,
                Some(m) if m.target.contains(label) => IncidenceRole::Target,
                _ => IncidenceRole::Member,
            };
            upsert_incidence(tx, edge_id, label, role, position as i64)?;
        }

        let provenance_chunk_index = chunk_index.unwrap_or(0);
        let provenance_text = chunks.get(provenance_chunk_index as usize).map(String::as_str);
        upsert_provenance(tx, edge_id, article_id, provenance_chunk_index, provenance_text)?;
    }

    for (label, vec) in &extracted.embeddings {
        let exists: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM hypergraph_nodes WHERE node_id = ?1",
                params![label],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        if exists == 0 {
            continue;
        }
        if node_embedding_exists(tx, label)? {
            continue;
        }
        upsert_node_embedding(tx, label, vec, embedding_model)?;
    }

    tx.execute(
        "UPDATE feed_items SET processing_status = 'completed', processing_error = NULL, chunk_count = ?2 WHERE id = ?1",
        params![article_id, chunks.len() as i64],
    )
    .map_err(sql_err)?;

    Ok(chunks.len() as i64)
}

/// Records an article as failed without aborting the caller's batch
/// (spec.md §4.2/§7: per-article failures don't abort the batch).
pub fn mark_article_failed(
    store_write: &Transaction,
    article_id: &str,
    message: &str,
) -> Result<(), CoreError> {
    store_write
        .execute(
            "UPDATE feed_items SET processing_status = 'failed', processing_error = ?2 WHERE id = ?1",
            params![article_id, message],
        )
        .map_err(sql_err)?;
    Ok(())
}

// --- Node merging (spec.md §4.3) -------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimilarNode {
    pub node_id: String,
    pub label: String,
    pub similarity: f64,
}

/// `find_similar_nodes`: brute-force scan of `node_embeddings`, converting
/// the configured cosine-similarity `threshold` to an L2 distance bound
/// under the unit-vector assumption (spec.md §4.3).
pub fn find_similar_nodes(
    conn: &Connection,
    node_id: &str,
    threshold: f64,
    limit: usize,
) -> Result<Vec<SimilarNode>, CoreError> {
    let probe: Vec<u8> = conn
        .query_row(
            "SELECT vector FROM node_embeddings WHERE node_id = ?1",
            params![node_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(sql_err)?
        .ok_or_else(|| CoreError::NoSimilarNodes)?;
    let probe = vector::normalize(&vector::unpack(&probe)?);

    let mut stmt = conn
        .prepare(
            "SELECT e.node_id, n.label, e.vector FROM node_embeddings e
             JOIN hypergraph_nodes n ON n.node_id = e.node_id
             WHERE e.node_id != ?1",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![node_id], |row| {
            let id: String = row.get(0)?;
            let label: String = row.get(1)?;
            let vec: Vec<u8> = row.get(2)?;
            Ok((id, label, vec))
        })
        .map_err(sql_err)?;

    let max_distance = vector::threshold_to_l2(threshold as f32);
    let mut results = Vec::new();
    for row in rows {
        let (id, label, raw) = row.map_err(sql_err)?;
        let v = vector::normalize(&vector::unpack(&raw)?);
        let d = vector::l2_distance(&probe, &v);
        if d <= max_distance {
            let similarity = vector::cosine_similarity_from_unit_l2(d) as f64;
            results.push(SimilarNode {
                node_id: id,
                label,
                similarity,
            });
        }
    }
    results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
    results.truncate(limit);
    if results.is_empty() {
        return Err(CoreError::NoSimilarNodes);
    }
    Ok(results)
}

#[derive(Debug, Clone)]
pub struct MergeSuggestion {
    pub id1: String,
    pub label1: String,
    pub type1: Option<String>,
    pub id2: String,
    pub label2: String,
    pub type2: Option<String>,
    pub similarity: f64,
}

/// `get_merge_suggestions`: all embedding pairs above `threshold`, with
/// `id1 < id2` enforced so each pair is reported once.
pub fn get_merge_suggestions(
    conn: &Connection,
    threshold: f64,
    limit: usize,
) -> Result<Vec<MergeSuggestion>, CoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT n.node_id, n.label, n.node_type, e.vector FROM node_embeddings e
             JOIN hypergraph_nodes n ON n.node_id = e.node_id",
        )
        .map_err(sql_err)?;
    let rows: Vec<(String, String, Option<String>, Vec<u8>)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .map_err(sql_err)?
        .collect::<Result<_, _>>()
        .map_err(sql_err)?;

    let max_distance = vector::threshold_to_l2(threshold as f32);
    let mut suggestions = Vec::new();
    for i in 0..rows.len() {
        let vi = vector::normalize(&vector::unpack(&rows[i].3)?);
        for j in (i + 1)..rows.len() {
            let vj = vector::normalize(&vector::unpack(&rows[j].3)?);
            let d = vector::l2_distance(&vi, &vj);
            if d > max_distance {
                continue;
            }
            let similarity = vector::cosine_similarity_from_unit_l2(d) as f64;
            let (a, b) = if rows[i].0 < rows[j].0 {
                (&rows[i], &rows[j])
            } else {
                (&rows[j], &rows[i])
            };
            suggestions.push(MergeSuggestion {
                id1: a.0.clone(),
                label1: a.1.clone(),
                type1: a.2.clone(),
                id2: b.0.clone(),
                label2: b.1.clone(),
                type2: b.2.clone(),
                similarity,
            });
        }
    }
    suggestions.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
    suggestions.truncate(limit);
    Ok(suggestions)
}

/// `merge(source, target, similarity)`: repoints incidences from `source`
/// to `target`, deduplicates by `(edge_id, node_id, role)` keeping the
/// smallest primary key, records history, deletes the source node and its
/// embedding, and garbage-collects any edge left with zero incidences.
pub fn merge_nodes(
    tx: &Transaction,
    source_id: &str,
    target_id: &str,
    similarity: f64,
) -> Result<(), CoreError> {
    let removed_label: Option<String> = tx
        .query_row(
            "SELECT label FROM hypergraph_nodes WHERE node_id = ?1",
            params![source_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(sql_err)?;
    let Some(removed_label) = removed_label else {
        return Err(CoreError::storage(format!("source node {source_id} not found")));
    };

    let affected_edges: Vec<String> = {
        let mut stmt = tx
            .prepare("SELECT DISTINCT edge_id FROM incidences WHERE node_id = ?1")
            .map_err(sql_err)?;
        stmt.query_map(params![source_id], |row| row.get(0))
            .map_err(sql_err)?
            .collect::<Result<_, _>>()
            .map_err(sql_err)?
    };

    // `OR IGNORE`: a row that would collide with an existing
    // `(edge_id, node_id, role)` on `target_id` (e.g. source and target
    // both `source` of the same edge) is left pointing at `source_id`
    // rather than aborting the statement; it is removed a few lines down
    // when `source_id`'s node row is deleted (`ON DELETE CASCADE`).
    tx.execute(
        "UPDATE OR IGNORE incidences SET node_id = ?2 WHERE node_id = ?1",
        params![source_id, target_id],
    )
    .map_err(sql_err)?;

    // Dedupe by (edge_id, node_id, role), keeping the smallest id.
    tx.execute(
        "DELETE FROM incidences
         WHERE id NOT IN (
             SELECT MIN(id) FROM incidences GROUP BY edge_id, node_id, role
         )",
        [],
    )
    .map_err(sql_err)?;

    tx.execute(
        "INSERT INTO node_merge_history (id, kept_node_id, removed_node_id, removed_label, similarity)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new_id(), target_id, source_id, removed_label, similarity],
    )
    .map_err(sql_err)?;

    tx.execute(
        "DELETE FROM node_embeddings WHERE node_id = ?1",
        params![source_id],
    )
    .map_err(sql_err)?;
    tx.execute(
        "DELETE FROM hypergraph_nodes WHERE node_id = ?1",
        params![source_id],
    )
    .map_err(sql_err)?;

    for edge_id in affected_edges {
        let remaining: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM incidences WHERE edge_id = ?1",
                params![edge_id],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        if remaining == 0 {
            tx.execute("DELETE FROM hyperedges WHERE edge_id = ?1", params![edge_id])
                .map_err(sql_err)?;
        }
    }

    Ok(())
}

/// One incidence row, as needed to build the path finder's adjacency maps.
#[derive(Debug, Clone)]
pub struct IncidenceRow {
    pub edge_id: String,
    pub node_id: String,
}

/// Loads every `(edge, node)` incidence pair, for the path finder's
/// one-time index build (spec.md §4.4 step 1).
pub fn load_all_incidences(conn: &Connection) -> Result<Vec<IncidenceRow>, CoreError> {
    let mut stmt = conn
        .prepare("SELECT edge_id, node_id FROM incidences")
        .map_err(sql_err)?;
    stmt.query_map([], |row| {
        Ok(IncidenceRow {
            edge_id: row.get(0)?,
            node_id: row.get(1)?,
        })
    })
    .map_err(sql_err)?
    .collect::<Result<Vec<_>, _>>()
    .map_err(sql_err)
}

/// One edge's display detail, as assembled by [`load_edge_details`].
#[derive(Debug, Clone)]
pub struct EdgeDetail {
    pub edge_id: String,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
    pub members: Vec<String>,
    pub article_id: Option<String>,
}

fn split_group_concat(raw: Option<String>) -> Vec<String> {
    raw.map(|s| s.split(',').map(str::to_string).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Fetches source/target/member labels and originating article for a set
/// of edges in a single batched query (spec.md §4.8 step 4): one
/// `GROUP_CONCAT` per role rather than one query per edge.
pub fn load_edge_details(conn: &Connection, edge_ids: &[String]) -> Result<Vec<EdgeDetail>, CoreError> {
    if edge_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = edge_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT h.edge_id,
                GROUP_CONCAT(DISTINCT CASE WHEN i.role = 'source' THEN n.label END),
                GROUP_CONCAT(DISTINCT CASE WHEN i.role = 'target' THEN n.label END),
                GROUP_CONCAT(DISTINCT n.label),
                (SELECT feed_item_id FROM article_edge_provenance p WHERE p.edge_id = h.edge_id LIMIT 1)
         FROM hyperedges h
         JOIN incidences i ON i.edge_id = h.edge_id
         JOIN hypergraph_nodes n ON n.node_id = i.node_id
         WHERE h.edge_id IN ({placeholders})
         GROUP BY h.edge_id"
    );
    let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
    let params: Vec<&dyn rusqlite::ToSql> = edge_ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let rows = stmt
        .query_map(params.as_slice(), |row| {
            let edge_id: String = row.get(0)?;
            let sources: Option<String> = row.get(1)?;
            let targets: Option<String> = row.get(2)?;
            let members: Option<String> = row.get(3)?;
            let article_id: Option<String> = row.get(4)?;
            Ok(EdgeDetail {
                edge_id,
                sources: split_group_concat(sources),
                targets: split_group_concat(targets),
                members: split_group_concat(members),
                article_id,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Edges adjacent to any of `node_ids`, for the "direct edges" fallback
/// set merged with path-gathered edges (spec.md §4.8 step 4).
pub fn edges_touching_nodes(
    conn: &Connection,
    node_ids: &[String],
    limit: usize,
) -> Result<Vec<String>, CoreError> {
    if node_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = node_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT DISTINCT edge_id FROM incidences WHERE node_id IN ({placeholders}) LIMIT ?{}",
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
        .query_map(params.as_slice(), |row| row.get(0))
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Loads every node's display label, keyed by node id.
pub fn load_node_labels(conn: &Connection) -> Result<HashMap<String, String>, CoreError> {
    let mut stmt = conn
        .prepare("SELECT node_id, label FROM hypergraph_nodes")
        .map_err(sql_err)?;
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(sql_err)?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(sql_err)
}

/// Document frequency per node: the count of distinct edges the node is
/// incident to, the denominator of spec.md §4.5's IDF formula.
pub fn node_document_frequencies(conn: &Connection) -> Result<HashMap<String, i64>, CoreError> {
    let mut stmt = conn
        .prepare("SELECT node_id, COUNT(DISTINCT edge_id) FROM incidences GROUP BY node_id")
        .map_err(sql_err)?;
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(sql_err)?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(sql_err)
}

/// Total hyperedge count, the `N` of spec.md §4.5's IDF formula.
pub fn total_edge_count(conn: &Connection) -> Result<i64, CoreError> {
    conn.query_row("SELECT COUNT(*) FROM hyperedges", [], |row| row.get(0))
        .map_err(sql_err)
}

/// One edge's source/target node-id participants, as needed to build an
/// event vector (spec.md §4.5): unlike [`load_edge_details`] this carries
/// node ids (the IDF/embedding key), not display labels.
#[derive(Debug, Clone)]
pub struct EdgeParticipants {
    pub edge_id: String,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
}

/// Loads every edge's source/target node-id participants in one pass, for
/// event-vector construction across the whole graph (spec.md §4.7 step 2).
pub fn load_all_edge_participants(conn: &Connection) -> Result<Vec<EdgeParticipants>, CoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT edge_id, node_id, role FROM incidences
             WHERE role IN ('source', 'target')
             ORDER BY edge_id, position",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            let edge_id: String = row.get(0)?;
            let node_id: String = row.get(1)?;
            let role: String = row.get(2)?;
            Ok((edge_id, node_id, role))
        })
        .map_err(sql_err)?;

    let mut by_edge: std::collections::BTreeMap<String, EdgeParticipants> = std::collections::BTreeMap::new();
    for row in rows {
        let (edge_id, node_id, role) = row.map_err(sql_err)?;
        let entry = by_edge.entry(edge_id.clone()).or_insert_with(|| EdgeParticipants {
            edge_id,
            sources: Vec::new(),
            targets: Vec::new(),
        });
        match role.as_str() {
            "source" => entry.sources.push(node_id),
            "target" => entry.targets.push(node_id),
            _ => {}
        }
    }
    Ok(by_edge.into_values().collect())
}

/// Every hyperedge's id and the `label` it was ingested with — the raw
/// verb/relation phrase event-vector family classification runs against
/// (spec.md §4.5: classification reads the extracted label, not the
/// ingest-relation-parsed-from-id, since the family keyword lists are
/// phrased against natural verb phrases like "partnered with").
pub fn load_all_edge_labels(conn: &Connection) -> Result<HashMap<String, String>, CoreError> {
    let mut stmt = conn.prepare("SELECT edge_id, label FROM hyperedges").map_err(sql_err)?;
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(sql_err)?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(sql_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use newsgraph_core::domain::ExtractedEdgeMetadata;
    use std::collections::BTreeMap;

    fn insert_article(tx: &Transaction, id: &str) {
        tx.execute(
            "INSERT INTO feed_items (id, source_id, guid, title, fetched_at) VALUES (?1,'s','g','t', datetime('now'))",
            params![id],
        )
        .unwrap();
    }

    fn sample_extraction() -> ExtractedHypergraph {
        let mut incidence_dict = BTreeMap::new();
        incidence_dict.insert(
            "partnered_with_chunk0_0".to_string(),
            vec!["Acme".to_string(), "Widgets".to_string()],
        );
        let metadata = vec![ExtractedEdgeMetadata {
            edge: "partnered_with_chunk0_0".to_string(),
            source: vec!["Acme".to_string()],
            target: vec!["Widgets".to_string()],
            chunk_id: "chunk0".to_string(),
        }];
        let mut embeddings = BTreeMap::new();
        embeddings.insert("Acme".to_string(), vec![1.0, 0.0]);
        embeddings.insert("Widgets".to_string(), vec![0.0, 1.0]);
        ExtractedHypergraph {
            incidence_dict,
            metadata,
            embeddings,
        }
    }

    #[test]
    fn persist_extraction_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let extraction = sample_extraction();

        for _ in 0..2 {
            store
                .write(|tx| {
                    insert_article(tx, "a1");
                    persist_extraction(
                        tx,
                        "a1",
                        "Acme partnered with Widgets today.",
                        &extraction,
                        "test-model",
                        &[vec![0.5, 0.5]],
                    )?;
                    Ok(())
                })
                .ok();
        }

        store
            .read(|conn| {
                let edges: i64 = conn
                    .query_row("SELECT COUNT(*) FROM hyperedges", [], |r| r.get(0))
                    .unwrap();
                let nodes: i64 = conn
                    .query_row("SELECT COUNT(*) FROM hypergraph_nodes", [], |r| r.get(0))
                    .unwrap();
                let incidences: i64 = conn
                    .query_row("SELECT COUNT(*) FROM incidences", [], |r| r.get(0))
                    .unwrap();
                let embeddings: i64 = conn
                    .query_row("SELECT COUNT(*) FROM node_embeddings", [], |r| r.get(0))
                    .unwrap();
                let chunk_embeddings: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunk_embeddings", [], |r| r.get(0))
                    .unwrap();
                assert_eq!(edges, 1);
                assert_eq!(nodes, 2);
                assert_eq!(incidences, 2);
                assert_eq!(embeddings, 2);
                assert_eq!(chunk_embeddings, 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn merge_repoints_incidences_and_gcs_orphaned_edges() {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|tx| {
                insert_article(tx, "a1");
                upsert_node(tx, "a", "A")?;
                upsert_node(tx, "b", "B")?;
                upsert_edge(tx, "e1_chunk0_0", "e1", None)?;
                upsert_incidence(tx, "e1_chunk0_0", "a", IncidenceRole::Source, 0)?;
                upsert_incidence(tx, "e1_chunk0_0", "b", IncidenceRole::Target, 1)?;
                upsert_provenance(tx, "e1_chunk0_0", "a1", 0, None)?;

                upsert_edge(tx, "e2_chunk0_0", "e2", None)?;
                upsert_incidence(tx, "e2_chunk0_0", "b", IncidenceRole::Source, 0)?;
                upsert_provenance(tx, "e2_chunk0_0", "a1", 0, None)?;

                merge_nodes(tx, "b", "a", 0.95)?;
                Ok(())
            })
            .unwrap();

        store
            .read(|conn| {
                let b_exists: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM hypergraph_nodes WHERE node_id = 'b'",
                        [],
                        |r| r.get(0),
                    )
                    .unwrap();
                assert_eq!(b_exists, 0);

                let e1_exists: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM hyperedges WHERE edge_id = 'e1_chunk0_0'",
                        [],
                        |r| r.get(0),
                    )
                    .unwrap();
                assert_eq!(e1_exists, 1, "e1 keeps its remaining incidence on 'a'");

                let e2_exists: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM hyperedges WHERE edge_id = 'e2_chunk0_0'",
                        [],
                        |r| r.get(0),
                    )
                    .unwrap();
                assert_eq!(e2_exists, 0, "e2 had only b's incidence and is garbage-collected");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn load_edge_details_groups_roles_and_finds_article() {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|tx| {
                insert_article(tx, "a1");
                upsert_node(tx, "acme", "Acme")?;
                upsert_node(tx, "widgets", "Widgets")?;
                upsert_edge(tx, "partnered_with_chunk0_0", "partnered_with", None)?;
                upsert_incidence(tx, "partnered_with_chunk0_0", "acme", IncidenceRole::Source, 0)?;
                upsert_incidence(tx, "partnered_with_chunk0_0", "widgets", IncidenceRole::Target, 1)?;
                upsert_provenance(tx, "partnered_with_chunk0_0", "a1", 0, None)?;
                Ok(())
            })
            .unwrap();

        let details = store
            .read(|conn| load_edge_details(conn, &["partnered_with_chunk0_0".to_string()]))
            .unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].sources, vec!["Acme"]);
        assert_eq!(details[0].targets, vec!["Widgets"]);
        assert_eq!(details[0].article_id.as_deref(), Some("a1"));
    }

    #[test]
    fn edges_touching_nodes_finds_incident_edges() {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|tx| {
                insert_article(tx, "a1");
                upsert_node(tx, "acme", "Acme")?;
                upsert_edge(tx, "e1_chunk0_0", "e1", None)?;
                upsert_incidence(tx, "e1_chunk0_0", "acme", IncidenceRole::Source, 0)?;
                Ok(())
            })
            .unwrap();

        let edges = store
            .read(|conn| edges_touching_nodes(conn, &["acme".to_string()], 50))
            .unwrap();
        assert_eq!(edges, vec!["e1_chunk0_0".to_string()]);
    }
}
