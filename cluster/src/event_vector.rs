//! Event vector construction (spec.md §4.5): an IDF-weighted pooled
//! embedding of an edge's source and target participants, plus a
//! relation-family one-hot, concatenated into one `3·d + 12`-dimensional
//! feature vector per hyperedge.

use std::collections::HashMap;

use newsgraph_storage::vector;

use crate::families::{RelationFamily, RELATION_FAMILY_COUNT};

/// One hyperedge's computed event vector.
#[derive(Debug, Clone)]
pub struct EventVector {
    pub edge_id: String,
    pub vector: Vec<f32>,
}

/// The dimensionality of an event vector built from `embedding_dim`-sized
/// node embeddings (spec.md §6's bit-exact constant).
pub fn event_vec_dim(embedding_dim: usize) -> usize {
    3 * embedding_dim + RELATION_FAMILY_COUNT
}

/// IDF-weighted mean of the embeddings for `labels`; the zero vector if
/// none of `labels` have an embedding or the weight sum is zero (spec.md
/// §4.5: "zero vector if Σ = 0").
fn weighted_mean(
    node_ids: &[String],
    embeddings: &HashMap<String, Vec<f32>>,
    idf: &HashMap<String, f64>,
    dim: usize,
) -> Vec<f32> {
    let mut sum = vec![0.0f64; dim];
    let mut weight_total = 0.0f64;
    for node_id in node_ids {
        let Some(emb) = embeddings.get(node_id) else { continue };
        let w = idf.get(node_id).copied().unwrap_or(1.0);
        weight_total += w;
        for (acc, x) in sum.iter_mut().zip(emb.iter()) {
            *acc += w * (*x as f64);
        }
    }
    if weight_total == 0.0 {
        return vec![0.0; dim];
    }
    sum.into_iter().map(|x| (x / weight_total) as f32).collect()
}

fn normalize_f32(v: &[f32]) -> Vec<f32> {
    vector::normalize(v)
}

fn subtract(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b.iter()).map(|(x, y)| x - y).collect()
}

/// Builds one edge's event vector (spec.md §4.5): `concat(sNorm, tNorm,
/// diffNorm, familyOneHot)`.
pub fn build_event_vector(
    edge_id: &str,
    sources: &[String],
    targets: &[String],
    relation_label: &str,
    embeddings: &HashMap<String, Vec<f32>>,
    idf: &HashMap<String, f64>,
    embedding_dim: usize,
) -> EventVector {
    let mu_s = weighted_mean(sources, embeddings, idf, embedding_dim);
    let mu_t = weighted_mean(targets, embeddings, idf, embedding_dim);

    let s_norm = normalize_f32(&mu_s);
    let t_norm = normalize_f32(&mu_t);
    let diff_norm = normalize_f32(&subtract(&mu_t, &mu_s));

    let family = RelationFamily::classify(relation_label);
    let one_hot = family.one_hot();

    let mut vector = Vec::with_capacity(event_vec_dim(embedding_dim));
    vector.extend_from_slice(&s_norm);
    vector.extend_from_slice(&t_norm);
    vector.extend_from_slice(&diff_norm);
    vector.extend_from_slice(&one_hot);

    EventVector {
        edge_id: edge_id.to_string(),
        vector,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embeddings_fixture() -> HashMap<String, Vec<f32>> {
        let mut m = HashMap::new();
        m.insert("acme".to_string(), vec![1.0, 0.0]);
        m.insert("widgets".to_string(), vec![0.0, 1.0]);
        m
    }

    #[test]
    fn dimension_matches_3d_plus_12() {
        let embeddings = embeddings_fixture();
        let idf = HashMap::from([("acme".to_string(), 2.0), ("widgets".to_string(), 2.0)]);
        let ev = build_event_vector(
            "partnered_with_chunk0_0",
            &["acme".to_string()],
            &["widgets".to_string()],
            "partnered with",
            &embeddings,
            &idf,
            2,
        );
        assert_eq!(ev.vector.len(), event_vec_dim(2));
        assert_eq!(ev.vector.len(), 3 * 2 + RELATION_FAMILY_COUNT);
    }

    #[test]
    fn missing_embeddings_yield_zero_vector_for_that_side() {
        let embeddings: HashMap<String, Vec<f32>> = HashMap::new();
        let idf: HashMap<String, f64> = HashMap::new();
        let ev = build_event_vector(
            "e_chunk0_0",
            &["unknown".to_string()],
            &["alsounknown".to_string()],
            "other",
            &embeddings,
            &idf,
            2,
        );
        // sNorm and tNorm both zero vectors (first 4 entries).
        assert!(ev.vector[..4].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn one_hot_segment_has_single_one() {
        let embeddings = embeddings_fixture();
        let idf = HashMap::from([("acme".to_string(), 1.0), ("widgets".to_string(), 1.0)]);
        let ev = build_event_vector(
            "acquired_chunk0_0",
            &["acme".to_string()],
            &["widgets".to_string()],
            "acquired",
            &embeddings,
            &idf,
            2,
        );
        let family_segment = &ev.vector[6..];
        assert_eq!(family_segment.len(), RELATION_FAMILY_COUNT);
        assert_eq!(family_segment.iter().filter(|&&x| x == 1.0).count(), 1);
    }
}
