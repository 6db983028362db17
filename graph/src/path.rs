//! S-connected BFS path finder (spec.md §4.4): shortest sequences of
//! hyperedges connecting pairs of nodes, where two edges are s-adjacent
//! iff they share at least `s` nodes.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use rusqlite::Connection;

use newsgraph_core::error::CoreError;
use newsgraph_storage::hypergraph::load_all_incidences;

pub const DEFAULT_DEPTH_CAP: usize = 4;
pub const DEFAULT_MAX_PATHS: usize = 3;

/// One discovered path: the ordered edges, the intersection labels at
/// each hop, and the full node-label membership of every edge on it.
#[derive(Debug, Clone)]
pub struct PathResult {
    pub edge_ids: Vec<String>,
    pub hop_intersections: Vec<Vec<String>>,
    pub edge_members: Vec<Vec<String>>,
}

/// A one-time index over all incidences: which edges touch each node,
/// which nodes each edge touches, and the precomputed s-adjacency between
/// edges. Rebuild whenever the underlying graph changes materially.
pub struct PathIndex {
    node_to_edges: HashMap<String, BTreeSet<String>>,
    edge_to_nodes: HashMap<String, BTreeSet<String>>,
    node_labels: HashMap<String, String>,
    adjacency: HashMap<String, BTreeSet<String>>,
}

impl PathIndex {
    /// Builds the index in one read pass (spec.md §4.4 step 1-2).
    pub fn build(conn: &Connection, s: usize) -> Result<Self, CoreError> {
        let incidences = load_all_incidences(conn)?;
        let node_labels = newsgraph_storage::hypergraph::load_node_labels(conn)?;

        let mut node_to_edges: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut edge_to_nodes: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in &incidences {
            node_to_edges
                .entry(row.node_id.clone())
                .or_default()
                .insert(row.edge_id.clone());
            edge_to_nodes
                .entry(row.edge_id.clone())
                .or_default()
                .insert(row.node_id.clone());
        }

        let adjacency = precompute_adjacency(&node_to_edges, &edge_to_nodes, s);

        Ok(Self {
            node_to_edges,
            edge_to_nodes,
            node_labels,
            adjacency,
        })
    }

    /// Finds shortest s-connected paths between every pair of `node_ids`
    /// (spec.md §4.4 step 3). Depth-capped at `depth_cap` hops, at most
    /// `max_paths` reported per pair.
    pub fn find_paths(
        &self,
        node_ids: &[String],
        depth_cap: usize,
        max_paths: usize,
    ) -> Vec<PathResult> {
        let mut results = Vec::new();
        let ids: Vec<&String> = node_ids.iter().collect();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                results.extend(self.bfs_pair(ids[i], ids[j], depth_cap, max_paths));
            }
        }
        results
    }

    fn bfs_pair(&self, a: &str, b: &str, depth_cap: usize, max_paths: usize) -> Vec<PathResult> {
        let Some(source_edges) = self.node_to_edges.get(a) else {
            return Vec::new();
        };
        let Some(target_edges) = self.node_to_edges.get(b) else {
            return Vec::new();
        };
        if source_edges.is_empty() || target_edges.is_empty() {
            return Vec::new();
        }

        // depth, per-edge parent lists, first-arrival depth
        let mut depth_of: HashMap<String, usize> = HashMap::new();
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        let mut frontier: VecDeque<String> = VecDeque::new();

        for e in source_edges {
            depth_of.insert(e.clone(), 1);
            frontier.push_back(e.clone());
        }

        let mut found_depth: Option<usize> = None;
        let mut found_targets: BTreeSet<String> = BTreeSet::new();
        let mut current_depth = 1;

        while !frontier.is_empty() && current_depth <= depth_cap {
            let mut next_frontier: VecDeque<String> = VecDeque::new();
            let level_size = frontier.len();
            for _ in 0..level_size {
                let edge = frontier.pop_front().unwrap();
                let d = depth_of[&edge];
                if d != current_depth {
                    // already processed at an earlier depth
                    continue;
                }
                if target_edges.contains(&edge) {
                    found_targets.insert(edge.clone());
                    if found_depth.is_none() {
                        found_depth = Some(current_depth);
                    }
                }
                if let Some(found) = found_depth {
                    if current_depth > found {
                        continue;
                    }
                }
                if let Some(neighbors) = self.adjacency.get(&edge) {
                    for neighbor in neighbors {
                        match depth_of.get(neighbor) {
                            None => {
                                depth_of.insert(neighbor.clone(), current_depth + 1);
                                parents
                                    .entry(neighbor.clone())
                                    .or_default()
                                    .push(edge.clone());
                                next_frontier.push_back(neighbor.clone());
                            }
                            Some(existing) if *existing == current_depth + 1 => {
                                parents
                                    .entry(neighbor.clone())
                                    .or_default()
                                    .push(edge.clone());
                            }
                            _ => {}
                        }
                    }
                }
            }
            if let Some(found) = found_depth {
                if current_depth >= found {
                    break;
                }
            }
            frontier = next_frontier;
            current_depth += 1;
        }

        let Some(target_depth) = found_depth else {
            return Vec::new();
        };

        let mut paths: Vec<Vec<String>> = Vec::new();
        for target in &found_targets {
            self.reconstruct(target, &parents, &mut Vec::new(), &mut paths, max_paths);
            if paths.len() >= max_paths {
                break;
            }
        }
        paths.truncate(max_paths);

        paths
            .into_iter()
            .map(|edge_ids| self.describe_path(&edge_ids))
            .collect::<Vec<_>>()
            .into_iter()
            .take(max_paths)
            .filter(|p| p.edge_ids.len() <= target_depth)
            .collect()
    }

    /// Recursively walks parent lists backward from `edge` to a source
    /// (no recorded parent), collecting full edge-id sequences.
    fn reconstruct(
        &self,
        edge: &str,
        parents: &HashMap<String, Vec<String>>,
        trail: &mut Vec<String>,
        out: &mut Vec<Vec<String>>,
        max_paths: usize,
    ) {
        if out.len() >= max_paths {
            return;
        }
        trail.push(edge.to_string());
        match parents.get(edge) {
            None => {
                let mut path = trail.clone();
                path.reverse();
                out.push(path);
            }
            Some(ps) => {
                for p in ps {
                    if out.len() >= max_paths {
                        break;
                    }
                    self.reconstruct(p, parents, trail, out, max_paths);
                }
            }
        }
        trail.pop();
    }

    fn describe_path(&self, edge_ids: &[String]) -> PathResult {
        let edge_members: Vec<Vec<String>> = edge_ids
            .iter()
            .map(|e| {
                self.edge_to_nodes
                    .get(e)
                    .map(|nodes| {
                        nodes
                            .iter()
                            .map(|n| self.node_labels.get(n).cloned().unwrap_or_else(|| n.clone()))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();

        let hop_intersections: Vec<Vec<String>> = edge_ids
            .windows(2)
            .map(|pair| {
                let empty = BTreeSet::new();
                let a = self.edge_to_nodes.get(&pair[0]).unwrap_or(&empty);
                let b = self.edge_to_nodes.get(&pair[1]).unwrap_or(&empty);
                a.intersection(b)
                    .map(|n| self.node_labels.get(n).cloned().unwrap_or_else(|| n.clone()))
                    .collect()
            })
            .collect();

        PathResult {
            edge_ids: edge_ids.to_vec(),
            hop_intersections,
            edge_members,
        }
    }
}

fn precompute_adjacency(
    node_to_edges: &HashMap<String, BTreeSet<String>>,
    edge_to_nodes: &HashMap<String, BTreeSet<String>>,
    s: usize,
) -> HashMap<String, BTreeSet<String>> {
    let mut adjacency: HashMap<String, BTreeSet<String>> = edge_to_nodes
        .keys()
        .map(|e| (e.clone(), BTreeSet::new()))
        .collect();
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();

    for (edge, nodes) in edge_to_nodes {
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        for node in nodes {
            if let Some(edges) = node_to_edges.get(node) {
                candidates.extend(edges.iter().cloned());
            }
        }
        for candidate in candidates {
            if &candidate == edge {
                continue;
            }
            let pair = if edge < &candidate {
                (edge.clone(), candidate.clone())
            } else {
                (candidate.clone(), edge.clone())
            };
            if !seen_pairs.insert(pair) {
                continue;
            }
            let empty = BTreeSet::new();
            let other_nodes = edge_to_nodes.get(&candidate).unwrap_or(&empty);
            let shared = nodes.intersection(other_nodes).count();
            if shared >= s {
                adjacency.get_mut(edge).unwrap().insert(candidate.clone());
                adjacency.get_mut(&candidate).unwrap().insert(edge.clone());
            }
        }
    }

    adjacency
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsgraph_storage::hypergraph::{upsert_edge, upsert_incidence, upsert_node, upsert_provenance};
    use newsgraph_storage::Store;

    fn seed_chain(store: &Store) {
        store
            .write(|tx| {
                tx.execute(
                    "INSERT INTO feed_items (id, source_id, guid, title, fetched_at) VALUES ('a1','s','g','t', datetime('now'))",
                    [],
                )
                .unwrap();
                for n in ["N1", "N2", "N3", "N4"] {
                    upsert_node(tx, n, n)?;
                }
                upsert_edge(tx, "E1", "r", None)?;
                upsert_incidence(tx, "E1", "N1", newsgraph_core::domain::IncidenceRole::Source, 0)?;
                upsert_incidence(tx, "E1", "N2", newsgraph_core::domain::IncidenceRole::Target, 1)?;
                upsert_provenance(tx, "E1", "a1", 0, None)?;

                upsert_edge(tx, "E2", "r", None)?;
                upsert_incidence(tx, "E2", "N2", newsgraph_core::domain::IncidenceRole::Source, 0)?;
                upsert_incidence(tx, "E2", "N3", newsgraph_core::domain::IncidenceRole::Target, 1)?;
                upsert_provenance(tx, "E2", "a1", 0, None)?;

                upsert_edge(tx, "E3", "r", None)?;
                upsert_incidence(tx, "E3", "N3", newsgraph_core::domain::IncidenceRole::Source, 0)?;
                upsert_incidence(tx, "E3", "N4", newsgraph_core::domain::IncidenceRole::Target, 1)?;
                upsert_provenance(tx, "E3", "a1", 0, None)?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn finds_chained_path_across_three_edges() {
        let store = Store::open_in_memory().unwrap();
        seed_chain(&store);
        let index = store.read(|conn| PathIndex::build(conn, 1)).unwrap();
        let paths = index.find_paths(
            &["N1".to_string(), "N4".to_string()],
            DEFAULT_DEPTH_CAP,
            DEFAULT_MAX_PATHS,
        );
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].edge_ids, vec!["E1", "E2", "E3"]);
        assert_eq!(paths[0].hop_intersections, vec![vec!["N2"], vec!["N3"]]);
    }

    #[test]
    fn disconnected_pair_returns_no_paths() {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|tx| {
                tx.execute(
                    "INSERT INTO feed_items (id, source_id, guid, title, fetched_at) VALUES ('a1','s','g','t', datetime('now'))",
                    [],
                )
                .unwrap();
                upsert_node(tx, "X", "X")?;
                upsert_node(tx, "Y", "Y")?;
                Ok(())
            })
            .unwrap();
        let index = store.read(|conn| PathIndex::build(conn, 1)).unwrap();
        let paths = index.find_paths(
            &["X".to_string(), "Y".to_string()],
            DEFAULT_DEPTH_CAP,
            DEFAULT_MAX_PATHS,
        );
        assert!(paths.is_empty());
    }
}
