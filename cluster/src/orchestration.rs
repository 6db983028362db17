//! Clustering orchestration (spec.md §4.7): `run_full_pipeline` drives IDF
//! computation, event-vector construction, HDBSCAN, artifact persistence,
//! and auto/LLM labeling end to end for one clustering build.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, instrument, warn};

use newsgraph_core::domain::new_id;
use newsgraph_core::edge_id::display_relation;
use newsgraph_core::error::CoreError;
use newsgraph_core::traits::LlmProvider;
use newsgraph_storage::hypergraph::EdgeParticipants;
use newsgraph_storage::{clusters, embeddings, hypergraph, vector, Store};

use crate::event_vector::{self, EventVector};
use crate::families::RelationFamily;
use crate::hdbscan::{self, HdbscanParams};
use crate::idf;
use crate::prompts::{cluster_labeling_prompt, CLUSTER_LABELING_SYSTEM};

const TOP_ENTITIES: usize = 20;
const TOP_FAMILIES: usize = 5;
const EXEMPLAR_COUNT: usize = 10;
const LLM_EXEMPLAR_SENTENCES: usize = 8;

/// Summary of one completed clustering run, returned for the caller to
/// report to the user.
#[derive(Debug, Clone)]
pub struct ClusteringReport {
    pub build_id: String,
    pub event_count: usize,
    pub cluster_count: usize,
    pub noise_count: usize,
}

#[derive(Debug, serde::Deserialize)]
struct ClusterLabelResponse {
    title: String,
    summary: String,
}

fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(stripped) = trimmed.strip_prefix("```json") {
        stripped.trim_end_matches("```").trim().to_string()
    } else if let Some(stripped) = trimmed.strip_prefix("```") {
        stripped.trim_end_matches("```").trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Runs the full clustering pipeline (spec.md §4.7) over everything
/// currently in the hypergraph, producing a fresh build id. `status_cb` is
/// called with coarse phase names; `progress_cb` with `(done, total)`
/// cluster-labeling progress.
#[instrument(skip(store, llm, params, status_cb, progress_cb), fields(build_id))]
pub async fn run_full_pipeline(
    store: &Store,
    llm: Option<&dyn LlmProvider>,
    embedding_dim: usize,
    params: HdbscanParams,
    mut status_cb: impl FnMut(&str),
    mut progress_cb: impl FnMut(usize, usize),
) -> Result<ClusteringReport, CoreError> {
    let build_id = new_id();
    tracing::Span::current().record("build_id", &build_id.as_str());
    info!("starting clustering build");

    status_cb("computing idf");
    let document_frequencies = store.read(hypergraph::node_document_frequencies)?;
    let total_edges = store.read(hypergraph::total_edge_count)?;
    let node_embeddings = store.read(embeddings::load_all_node_embeddings)?;
    let edge_participants = store.read(hypergraph::load_all_edge_participants)?;
    let edge_labels = store.read(hypergraph::load_all_edge_labels)?;
    let idf_table = idf::compute_all(&document_frequencies, total_edges);
    debug!(edge_count = total_edges, distinct_terms = idf_table.len(), "idf table computed");

    status_cb("building event vectors");
    let event_vectors = build_event_vectors(&edge_participants, &edge_labels, &node_embeddings, &idf_table, embedding_dim);
    debug!(event_count = event_vectors.len(), "event vectors built");

    {
        let build_id = build_id.clone();
        let event_vectors = event_vectors.clone();
        store.write(move |tx| {
            clusters::reset_build(tx, &build_id)?;
            for ev in &event_vectors {
                clusters::upsert_event_vector(tx, &build_id, &ev.edge_id, &ev.vector)?;
            }
            Ok(())
        })?;
    }

    status_cb("running hdbscan");
    let vectors: Vec<Vec<f32>> = event_vectors.iter().map(|ev| ev.vector.clone()).collect();
    let result = hdbscan::run(&vectors, params);

    status_cb("persisting cluster assignments");
    {
        let build_id = build_id.clone();
        let event_vectors = event_vectors.clone();
        let labels = result.labels.clone();
        let memberships = result.memberships.clone();
        store.write(move |tx| {
            for (i, ev) in event_vectors.iter().enumerate() {
                clusters::insert_event_cluster(tx, &build_id, &ev.edge_id, labels[i], memberships[i])?;
            }
            Ok(())
        })?;
    }

    let mut by_cluster: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in result.labels.iter().enumerate() {
        if label > 0 {
            by_cluster.entry(label).or_default().push(i);
        }
    }
    let noise_count = result.labels.iter().filter(|&&l| l < 0).count();
    let total_clusters = by_cluster.len();

    let node_labels = store.read(hypergraph::load_node_labels)?;

    debug!(cluster_count = total_clusters, noise_count, "cluster assignments persisted");

    status_cb("labeling clusters");
    for (progress_index, (label, member_indices)) in by_cluster.into_iter().enumerate() {
        progress_cb(progress_index, total_clusters);
        label_one_cluster(
            store,
            llm,
            &build_id,
            label,
            &member_indices,
            &event_vectors,
            &edge_participants,
            &edge_labels,
            &idf_table,
            &node_labels,
        )
        .await?;
    }

    info!(
        event_count = event_vectors.len(),
        cluster_count = total_clusters,
        noise_count,
        "clustering build finished"
    );
    Ok(ClusteringReport {
        build_id,
        event_count: event_vectors.len(),
        cluster_count: total_clusters,
        noise_count,
    })
}

fn build_event_vectors(
    edge_participants: &[EdgeParticipants],
    edge_labels: &HashMap<String, String>,
    node_embeddings: &HashMap<String, Vec<f32>>,
    idf_table: &HashMap<String, f64>,
    embedding_dim: usize,
) -> Vec<EventVector> {
    edge_participants
        .iter()
        .map(|ep| {
            let relation_label = edge_labels.get(&ep.edge_id).map(String::as_str).unwrap_or("");
            event_vector::build_event_vector(
                &ep.edge_id,
                &ep.sources,
                &ep.targets,
                relation_label,
                node_embeddings,
                idf_table,
                embedding_dim,
            )
        })
        .collect()
}

/// Normalized mean of a cluster's member vectors (spec.md §4.7 step 5).
fn centroid_of(member_vectors: &[&Vec<f32>]) -> Vec<f32> {
    if member_vectors.is_empty() {
        return Vec::new();
    }
    let dim = member_vectors[0].len();
    let mut sum = vec![0.0f64; dim];
    for v in member_vectors {
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += *x as f64;
        }
    }
    let n = member_vectors.len() as f64;
    let mean: Vec<f32> = sum.into_iter().map(|x| (x / n) as f32).collect();
    vector::normalize(&mean)
}

/// `"Entity1, Entity2 -- TopFamily"` (spec.md §4.7 step 5).
fn auto_label(top_entity_labels: &[String], top_family_names: &[String]) -> String {
    let entities = top_entity_labels.iter().take(2).cloned().collect::<Vec<_>>().join(", ");
    let family = top_family_names.first().cloned().unwrap_or_else(|| "other".to_string());
    if entities.is_empty() {
        family
    } else {
        format!("{entities} -- {family}")
    }
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip_all, fields(cluster_id = %label, size = member_indices.len()))]
async fn label_one_cluster(
    store: &Store,
    llm: Option<&dyn LlmProvider>,
    build_id: &str,
    label: i64,
    member_indices: &[usize],
    event_vectors: &[EventVector],
    edge_participants: &[EdgeParticipants],
    edge_labels: &HashMap<String, String>,
    idf_table: &HashMap<String, f64>,
    node_labels: &HashMap<String, String>,
) -> Result<(), CoreError> {
    let cluster_id = label.to_string();

    let member_vectors: Vec<&Vec<f32>> = member_indices.iter().map(|&i| &event_vectors[i].vector).collect();
    let centroid = centroid_of(&member_vectors);

    let mut entity_scores: HashMap<String, f64> = HashMap::new();
    let mut family_counts: HashMap<RelationFamily, usize> = HashMap::new();
    for &i in member_indices {
        let ep = &edge_participants[i];
        for node_id in ep.sources.iter().chain(ep.targets.iter()) {
            let weight = idf_table.get(node_id).copied().unwrap_or(1.0);
            *entity_scores.entry(node_id.clone()).or_insert(0.0) += weight;
        }
        let relation_label = edge_labels.get(&ep.edge_id).map(String::as_str).unwrap_or("");
        *family_counts.entry(RelationFamily::classify(relation_label)).or_insert(0) += 1;
    }

    let mut top_entities: Vec<(String, f64)> = entity_scores.into_iter().collect();
    top_entities.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
    top_entities.truncate(TOP_ENTITIES);
    let top_entity_labels: Vec<String> = top_entities
        .iter()
        .map(|(node_id, _)| node_labels.get(node_id).cloned().unwrap_or_else(|| node_id.clone()))
        .collect();

    let mut top_families: Vec<(RelationFamily, usize)> = family_counts.into_iter().collect();
    top_families.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_families.truncate(TOP_FAMILIES);
    let top_family_names: Vec<String> = top_families.iter().map(|(f, _)| f.as_str().to_string()).collect();

    let mut scored: Vec<(usize, f32)> = member_indices
        .iter()
        .map(|&i| (i, 1.0 - vector::cosine_distance(&event_vectors[i].vector, &centroid)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    let exemplar_indices: Vec<usize> = scored.iter().take(EXEMPLAR_COUNT).map(|(i, _)| *i).collect();

    let auto_label_text = auto_label(&top_entity_labels, &top_family_names);
    let top_entities_json = serde_json::to_string(&top_entity_labels).map_err(|e| CoreError::Malformed {
        message: format!("top entities json: {e}"),
    })?;
    let top_families_json = serde_json::to_string(&top_family_names).map_err(|e| CoreError::Malformed {
        message: format!("top families json: {e}"),
    })?;

    {
        let build_id = build_id.to_string();
        let cluster_id = cluster_id.clone();
        let auto_label_text = auto_label_text.clone();
        let size = member_indices.len() as i64;
        let centroid = centroid.clone();
        let exemplar_edge_ids: Vec<String> =
            exemplar_indices.iter().map(|&i| event_vectors[i].edge_id.clone()).collect();
        store.write(move |tx| {
            clusters::insert_cluster(
                tx,
                &build_id,
                &clusters::NewCluster {
                    cluster_id: &cluster_id,
                    label: Some(&auto_label_text),
                    size,
                    centroid: &centroid,
                    top_entities_json: &top_entities_json,
                    top_families_json: &top_families_json,
                    summary: None,
                },
            )?;
            for (rank, edge_id) in exemplar_edge_ids.iter().enumerate() {
                clusters::insert_exemplar(tx, &build_id, &cluster_id, edge_id, rank as i64)?;
            }
            Ok(())
        })?;
    }

    let Some(llm) = llm else { return Ok(()) };

    let exemplar_edge_ids: Vec<String> = exemplar_indices
        .iter()
        .take(LLM_EXEMPLAR_SENTENCES)
        .map(|&i| event_vectors[i].edge_id.clone())
        .collect();
    let details = store.read(|conn| hypergraph::load_edge_details(conn, &exemplar_edge_ids))?;
    let sentences: Vec<String> = details
        .iter()
        .map(|d| {
            format!(
                "{} {} {}",
                d.sources.join(" & "),
                display_relation(&d.edge_id),
                d.targets.join(" & ")
            )
        })
        .collect();

    let prompt = cluster_labeling_prompt(&top_entity_labels, &top_family_names, &sentences);
    match try_llm_label(llm, &prompt).await {
        Ok(labeled) => {
            let build_id = build_id.to_string();
            let cluster_id = cluster_id.clone();
            store.write(move |tx| {
                clusters::update_cluster_summary(tx, &build_id, &cluster_id, &labeled.title, &labeled.summary)
            })?;
        }
        Err(e) => {
            warn!(cluster_id = %cluster_id, error = %e, "cluster labeling failed, keeping auto-label");
        }
    }

    Ok(())
}

async fn try_llm_label(llm: &dyn LlmProvider, prompt: &str) -> Result<ClusterLabelResponse, CoreError> {
    let raw = llm.complete(CLUSTER_LABELING_SYSTEM, prompt).await?;
    let cleaned = strip_code_fences(&raw);
    serde_json::from_str(&cleaned).map_err(|e| CoreError::Malformed {
        message: format!("cluster label json: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_label_combines_top_two_entities_and_top_family() {
        let label = auto_label(&["Acme".to_string(), "Widgets Inc".to_string()], &["partnership".to_string()]);
        assert_eq!(label, "Acme, Widgets Inc -- partnership");
    }

    #[test]
    fn auto_label_falls_back_to_family_when_no_entities() {
        let label = auto_label(&[], &["other".to_string()]);
        assert_eq!(label, "other");
    }

    #[test]
    fn centroid_of_single_vector_is_its_normalization() {
        let v = vec![3.0f32, 4.0];
        let centroid = centroid_of(&[&v]);
        assert!((centroid[0] - 0.6).abs() < 1e-6);
        assert!((centroid[1] - 0.8).abs() < 1e-6);
    }
}
