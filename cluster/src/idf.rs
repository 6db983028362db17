//! IDF weighting over hypergraph nodes (spec.md §4.5): rare entities get
//! more weight, clamped so a node appearing in only one edge doesn't
//! dominate a pooled embedding.

use std::collections::HashMap;

pub const IDF_MAX: f64 = 6.0;

/// `idf(n) = min(log((N+1)/(df(n)+1)) + 1, IDF_MAX)`, where `N` is the
/// total edge count and `df(n)` is the number of distinct edges `n` is
/// incident to.
pub fn idf(document_frequency: i64, total_edges: i64) -> f64 {
    let raw = ((total_edges as f64 + 1.0) / (document_frequency as f64 + 1.0)).ln() + 1.0;
    raw.min(IDF_MAX)
}

/// Computes IDF for every node in `document_frequencies`, keyed by node id.
pub fn compute_all(document_frequencies: &HashMap<String, i64>, total_edges: i64) -> HashMap<String, f64> {
    document_frequencies
        .iter()
        .map(|(node_id, df)| (node_id.clone(), idf(*df, total_edges)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_never_exceeds_idf_max() {
        assert!(idf(0, 1000) <= IDF_MAX);
        assert!((idf(0, 1_000_000) - IDF_MAX).abs() < 1e-9);
    }

    #[test]
    fn node_in_every_edge_is_near_floor() {
        let v = idf(100, 100);
        assert!(v >= 1.0 - 1e-9);
        assert!(v < 1.5);
    }

    #[test]
    fn rarer_node_has_higher_idf() {
        let common = idf(50, 100);
        let rare = idf(1, 100);
        assert!(rare > common);
    }

    proptest::proptest! {
        #[test]
        fn idf_never_exceeds_the_clamp(document_frequency in 0i64..10_000, total_edges in 0i64..10_000) {
            proptest::prop_assert!(idf(document_frequency, total_edges) <= IDF_MAX);
        }

        #[test]
        fn idf_is_never_negative(document_frequency in 0i64..10_000, total_edges in 0i64..10_000) {
            proptest::prop_assert!(idf(document_frequency, total_edges) >= 0.0);
        }
    }
}
