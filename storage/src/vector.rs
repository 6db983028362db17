//! Brute-force vector search over BLOB-packed `f32` vectors.
//!
//! This replaces the HNSW-over-SQLite virtual table the teacher's
//! `vectorlite-rs` crate provides (no real source for that crate was
//! available to ground an implementation on — see DESIGN.md). For the
//! data sizes this system targets (single-process, local-first news
//! archives) a full scan per query is adequate; the `VectorIndex` trait
//! below is the seam a real ANN index would replace.

use zerocopy::IntoBytes;

use newsgraph_core::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    L2,
    Cosine,
}

/// Packs a vector for storage in a `BLOB` column.
pub fn pack(vector: &[f32]) -> Vec<u8> {
    vector.as_bytes().to_vec()
}

/// Unpacks a vector previously written by [`pack`].
pub fn unpack(bytes: &[u8]) -> Result<Vec<f32>, CoreError> {
    if bytes.len() % 4 != 0 {
        return Err(CoreError::storage("vector blob length not a multiple of 4"));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// L2 (Euclidean) norm.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalizes `v` to unit length. A zero vector normalizes to itself.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n == 0.0 {
        v.to_vec()
    } else {
        v.iter().map(|x| x / n).collect()
    }
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Cosine distance (`1 - cosine similarity`), computed directly rather than
/// via the L2-assumes-unit-vectors shortcut, so it is correct regardless of
/// whether the stored vectors are unit-normalized.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        1.0
    } else {
        1.0 - (dot / denom)
    }
}

/// Converts an L2 distance between unit vectors to cosine similarity:
/// `sim = 1 - d^2/2`. Only valid when both vectors are unit-norm; see
/// DESIGN.md's note on this open question.
pub fn cosine_similarity_from_unit_l2(distance: f32) -> f32 {
    1.0 - (distance * distance) / 2.0
}

/// Inverse of [`cosine_similarity_from_unit_l2`]: the L2 distance, between
/// unit vectors, corresponding to a target cosine similarity threshold.
pub fn threshold_to_l2(similarity_threshold: f32) -> f32 {
    (2.0 * (1.0 - similarity_threshold)).sqrt().max(0.0)
}

pub fn distance(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::L2 => l2_distance(a, b),
        Metric::Cosine => cosine_distance(a, b),
    }
}

/// Scans `candidates` and returns the `limit` closest by `metric`, ascending.
pub fn knn(
    probe: &[f32],
    candidates: impl IntoIterator<Item = (String, Vec<f32>)>,
    metric: Metric,
    limit: usize,
) -> Vec<(String, f32)> {
    let mut scored: Vec<(String, f32)> = candidates
        .into_iter()
        .map(|(id, v)| (id, distance(metric, probe, &v)))
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips() {
        let v = vec![1.0_f32, -2.5, 0.0, 3.25];
        let packed = pack(&v);
        let unpacked = unpack(&packed).unwrap();
        assert_eq!(v, unpacked);
    }

    #[test]
    fn normalize_zero_vector_is_itself() {
        let z = vec![0.0, 0.0, 0.0];
        assert_eq!(normalize(&z), z);
    }

    #[test]
    fn normalize_unit_length() {
        let v = vec![3.0, 4.0];
        let n = normalize(&v);
        assert!((norm(&n) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_round_trip_via_unit_l2() {
        let threshold = 0.85_f32;
        let d = threshold_to_l2(threshold);
        let sim = cosine_similarity_from_unit_l2(d);
        assert!((sim - threshold).abs() < 1e-5);
    }

    #[test]
    fn knn_orders_ascending_by_distance() {
        let probe = vec![0.0, 0.0];
        let candidates = vec![
            ("far".to_string(), vec![10.0, 0.0]),
            ("near".to_string(), vec![1.0, 0.0]),
            ("mid".to_string(), vec![5.0, 0.0]),
        ];
        let result = knn(&probe, candidates, Metric::L2, 2);
        assert_eq!(result[0].0, "near");
        assert_eq!(result[1].0, "mid");
    }
}
