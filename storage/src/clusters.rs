//! Persistence for clustering artifacts (spec.md §4.5-§4.7): event
//! vectors, clusters, per-event assignments, membership, and exemplars.

use rusqlite::{params, Connection, Transaction};

use newsgraph_core::error::CoreError;

use crate::vector;

fn sql_err(e: rusqlite::Error) -> CoreError {
    CoreError::storage(e.to_string())
}

pub fn upsert_event_vector(
    tx: &Transaction,
    build_id: &str,
    edge_id: &str,
    vec: &[f32],
) -> Result<(), CoreError> {
    tx.execute(
        "DELETE FROM event_vectors WHERE build_id = ?1 AND edge_id = ?2",
        params![build_id, edge_id],
    )
    .map_err(sql_err)?;
    tx.execute(
        "INSERT INTO event_vectors (edge_id, build_id, vector, dim) VALUES (?1, ?2, ?3, ?4)",
        params![edge_id, build_id, vector::pack(vec), vec.len() as i64],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn load_event_vectors(
    conn: &Connection,
    build_id: &str,
) -> Result<Vec<(String, Vec<f32>)>, CoreError> {
    let mut stmt = conn
        .prepare("SELECT edge_id, vector FROM event_vectors WHERE build_id = ?1")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![build_id], |row| {
            let edge_id: String = row.get(0)?;
            let raw: Vec<u8> = row.get(1)?;
            Ok((edge_id, raw))
        })
        .map_err(sql_err)?;
    let mut out = Vec::new();
    for row in rows {
        let (edge_id, raw) = row.map_err(sql_err)?;
        out.push((edge_id, vector::unpack(&raw)?));
    }
    Ok(out)
}

pub struct NewCluster<'a> {
    pub cluster_id: &'a str,
    pub label: Option<&'a str>,
    pub size: i64,
    pub centroid: &'a [f32],
    pub top_entities_json: &'a str,
    pub top_families_json: &'a str,
    pub summary: Option<&'a str>,
}

pub fn insert_cluster(tx: &Transaction, build_id: &str, c: &NewCluster) -> Result<(), CoreError> {
    tx.execute(
        "INSERT INTO clusters (cluster_id, build_id, label, size, centroid, top_entities_json, top_families_json, summary)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            c.cluster_id,
            build_id,
            c.label,
            c.size,
            vector::pack(c.centroid),
            c.top_entities_json,
            c.top_families_json,
            c.summary,
        ],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn update_cluster_summary(
    tx: &Transaction,
    build_id: &str,
    cluster_id: &str,
    label: &str,
    summary: &str,
) -> Result<(), CoreError> {
    tx.execute(
        "UPDATE clusters SET label = ?3, summary = ?4 WHERE build_id = ?1 AND cluster_id = ?2",
        params![build_id, cluster_id, label, summary],
    )
    .map_err(sql_err)?;
    Ok(())
}

pub fn insert_event_cluster(
    tx: &Transaction,
    build_id: &str,
    edge_id: &str,
    cluster_label: i64,
    membership_score: f64,
) -> Result<(), CoreError> {
    tx.execute(
        "INSERT INTO event_cluster (build_id, edge_id, cluster_label, membership_score) VALUES (?1, ?2, ?3, ?4)",
        params![build_id, edge_id, cluster_label, membership_score],
    )
    .map_err(sql_err)?;
    if cluster_label >= 0 {
        tx.execute(
            "INSERT INTO cluster_members (build_id, cluster_id, edge_id, membership_score) VALUES (?1, ?2, ?3, ?4)",
            params![build_id, cluster_label.to_string(), edge_id, membership_score],
        )
        .map_err(sql_err)?;
    }
    Ok(())
}

pub fn insert_exemplar(
    tx: &Transaction,
    build_id: &str,
    cluster_id: &str,
    edge_id: &str,
    rank: i64,
) -> Result<(), CoreError> {
    tx.execute(
        "INSERT INTO cluster_exemplars (build_id, cluster_id, edge_id, rank) VALUES (?1, ?2, ?3, ?4)",
        params![build_id, cluster_id, edge_id, rank],
    )
    .map_err(sql_err)?;
    Ok(())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ClusterRow {
    pub cluster_id: String,
    pub label: Option<String>,
    pub size: i64,
    pub summary: Option<String>,
}

/// Lists every cluster of a build, largest first (facade reporting; spec.md §6).
pub fn list_clusters(conn: &Connection, build_id: &str) -> Result<Vec<ClusterRow>, CoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT cluster_id, label, size, summary FROM clusters
             WHERE build_id = ?1 ORDER BY size DESC",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![build_id], |row| {
            Ok(ClusterRow {
                cluster_id: row.get(0)?,
                label: row.get(1)?,
                size: row.get(2)?,
                summary: row.get(3)?,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Resets a build's artifacts in FK-respecting order (spec.md §4.7):
/// `cluster_exemplars → cluster_members → event_cluster → clusters →
/// event_vectors`.
pub fn reset_build(tx: &Transaction, build_id: &str) -> Result<(), CoreError> {
    for table in [
        "cluster_exemplars",
        "cluster_members",
        "event_cluster",
        "clusters",
        "event_vectors",
    ] {
        tx.execute(
            &format!("DELETE FROM {table} WHERE build_id = ?1"),
            params![build_id],
        )
        .map_err(sql_err)?;
    }
    Ok(())
}
