//! Pure-numeric HDBSCAN (spec.md §4.6): pairwise distances, core
//! distances, mutual reachability, a Prim's-algorithm MST, a condensed
//! tree built from it, and Excess-of-Mass cluster selection — no external
//! clustering library.
//!
//! This is the one module in the workspace with no third-party crate to
//! lean on: every step below is a direct, deterministic implementation of
//! the algorithm spec.md §4.6 describes, tie-breaking ties toward the
//! smaller candidate index throughout so repeated runs over identical
//! input are byte-identical (spec.md §8's determinism property).

use std::collections::HashMap;

/// Tunables for one HDBSCAN run, clamped to the data size if the caller's
/// values would otherwise make no sense for `n` points.
#[derive(Debug, Clone, Copy)]
pub struct HdbscanParams {
    pub min_cluster_size: usize,
    pub min_samples: usize,
}

impl HdbscanParams {
    pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 20;
    pub const DEFAULT_MIN_SAMPLES: usize = 10;

    pub fn clamped(self, n: usize) -> Self {
        Self {
            min_cluster_size: self.min_cluster_size.max(1),
            // A point's core distance is its k-th nearest *other* point;
            // k can be at most n - 1.
            min_samples: self.min_samples.max(1).min(n.saturating_sub(1).max(1)),
        }
    }
}

impl Default for HdbscanParams {
    fn default() -> Self {
        Self {
            min_cluster_size: Self::DEFAULT_MIN_CLUSTER_SIZE,
            min_samples: Self::DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Cluster labels (positive integers, or `-1` for noise) and per-point
/// soft membership scores for one HDBSCAN run.
#[derive(Debug, Clone)]
pub struct HdbscanResult {
    pub labels: Vec<i64>,
    pub memberships: Vec<f64>,
}

impl HdbscanResult {
    pub fn cluster_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l > 0).collect::<std::collections::HashSet<_>>().len()
    }
}

/// Runs HDBSCAN over `points` (each a dense feature vector of identical
/// length, e.g. an event vector).
pub fn run(points: &[Vec<f32>], params: HdbscanParams) -> HdbscanResult {
    let n = points.len();
    if n == 0 {
        return HdbscanResult {
            labels: Vec::new(),
            memberships: Vec::new(),
        };
    }
    if n == 1 {
        return HdbscanResult {
            labels: vec![-1],
            memberships: vec![0.0],
        };
    }

    let params = params.clamped(n);

    let dist = pairwise_distances(points);
    let core = core_distances(&dist, params.min_samples);
    let mr = mutual_reachability(&dist, &core);
    let mst_edges = prim_mst(&mr, n);
    let tree = SingleLinkageTree::build(&mst_edges, n);

    let mut state = CondenseState::new();
    if n >= 2 {
        // Top-level recursion starts outside any real cluster (`label =
        // None`): spec.md §4.6 step 5's "collapse chains silently" rule
        // applies transitively until the data is big enough to form a
        // real cluster at all.
        condense(tree.root(), None, 0.0, &tree, params.min_cluster_size, &mut state);
    }

    let (selected, selected_stability) = select_eom(&state);

    assign_labels(n, &state, &selected, &selected_stability)
}

// --- distance computation ---------------------------------------------------

fn pairwise_distances(points: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let n = points.len();
    let norms_sq: Vec<f64> = points
        .iter()
        .map(|p| p.iter().map(|x| (*x as f64) * (*x as f64)).sum())
        .collect();

    let mut dist = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dot: f64 = points[i]
                .iter()
                .zip(points[j].iter())
                .map(|(a, b)| (*a as f64) * (*b as f64))
                .sum();
            let d2 = (norms_sq[i] + norms_sq[j] - 2.0 * dot).max(0.0);
            let d = d2.sqrt() as f32;
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }
    dist
}

fn core_distances(dist: &[Vec<f32>], min_samples: usize) -> Vec<f32> {
    let n = dist.len();
    let mut core = vec![0.0f32; n];
    for i in 0..n {
        let mut row: Vec<f32> = dist[i]
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, d)| *d)
            .collect();
        row.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let k = min_samples.saturating_sub(1).min(row.len().saturating_sub(1));
        core[i] = row.get(k).copied().unwrap_or(0.0);
    }
    core
}

fn mutual_reachability(dist: &[Vec<f32>], core: &[f32]) -> Vec<Vec<f32>> {
    let n = dist.len();
    let mut mr = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            mr[i][j] = dist[i][j].max(core[i]).max(core[j]);
        }
    }
    mr
}

// --- minimum spanning tree (Prim's) -----------------------------------------

struct MstEdge {
    a: usize,
    b: usize,
    weight: f32,
    discovery_order: usize,
}

/// Prim's algorithm over the implicit complete mutual-reachability graph.
/// Ties in the frontier pick the smallest candidate index (spec.md §4.6's
/// determinism note), since the scan below keeps the first minimum seen.
fn prim_mst(mr: &[Vec<f32>], n: usize) -> Vec<MstEdge> {
    let mut in_tree = vec![false; n];
    let mut best_edge = vec![f32::INFINITY; n];
    let mut best_from: Vec<Option<usize>> = vec![None; n];
    best_edge[0] = 0.0;

    let mut edges = Vec::with_capacity(n.saturating_sub(1));
    let mut order = 0usize;

    for _ in 0..n {
        let mut u = None;
        let mut best = f32::INFINITY;
        for v in 0..n {
            if !in_tree[v] && best_edge[v] < best {
                best = best_edge[v];
                u = Some(v);
            }
        }
        let Some(u) = u else { break };
        in_tree[u] = true;
        if let Some(parent) = best_from[u] {
            edges.push(MstEdge {
                a: parent,
                b: u,
                weight: best_edge[u],
                discovery_order: order,
            });
            order += 1;
        }
        for v in 0..n {
            if in_tree[v] {
                continue;
            }
            let w = mr[u][v];
            if w < best_edge[v] {
                best_edge[v] = w;
                best_from[v] = Some(u);
            }
        }
    }
    edges
}

// --- single-linkage tree -----------------------------------------------------

struct MergeNode {
    left: usize,
    right: usize,
    left_size: usize,
    right_size: usize,
    lambda: f64,
}

struct SingleLinkageTree {
    n: usize,
    merges: HashMap<usize, MergeNode>,
    root: usize,
}

impl SingleLinkageTree {
    /// Builds the tree by processing MST edges ascending by weight (ties
    /// broken by discovery order), maintaining a union-find over point
    /// indices. Internal node ids start at `n`; the root is `2n - 2`.
    fn build(mst_edges: &[MstEdge], n: usize) -> Self {
        let mut sorted: Vec<&MstEdge> = mst_edges.iter().collect();
        sorted.sort_by(|a, b| {
            a.weight
                .partial_cmp(&b.weight)
                .unwrap()
                .then(a.discovery_order.cmp(&b.discovery_order))
        });

        let mut uf_parent: Vec<usize> = (0..n).collect();
        let mut comp_size = vec![1usize; n];
        let mut comp_tree_node: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], x: usize) -> usize {
            if parent[x] != x {
                parent[x] = find(parent, parent[x]);
            }
            parent[x]
        }

        let mut merges = HashMap::new();
        let mut next_id = n;
        let mut root = n.saturating_sub(1); // fallback for n == 1, never used here

        for edge in sorted {
            let ru = find(&mut uf_parent, edge.a);
            let rv = find(&mut uf_parent, edge.b);
            if ru == rv {
                continue;
            }
            let left_node = comp_tree_node[ru];
            let right_node = comp_tree_node[rv];
            let left_size = comp_size[ru];
            let right_size = comp_size[rv];

            let new_id = next_id;
            next_id += 1;

            let lambda = if edge.weight > 0.0 {
                1.0 / edge.weight as f64
            } else {
                f64::INFINITY
            };
            merges.insert(
                new_id,
                MergeNode {
                    left: left_node,
                    right: right_node,
                    left_size,
                    right_size,
                    lambda,
                },
            );

            // union by attaching rv's component under ru's root.
            uf_parent[rv] = ru;
            comp_size[ru] = left_size + right_size;
            comp_tree_node[ru] = new_id;
            root = new_id;
        }

        Self { n, merges, root }
    }

    fn root(&self) -> usize {
        self.root
    }

    fn size_of(&self, node: usize) -> usize {
        if node < self.n {
            1
        } else {
            let m = &self.merges[&node];
            m.left_size + m.right_size
        }
    }

    /// Collects every point index under `node` (used only when a subtree
    /// is about to stop being tracked further: a discard or a collapse).
    fn collect_leaves(&self, node: usize, out: &mut Vec<usize>) {
        if node < self.n {
            out.push(node);
            return;
        }
        let m = &self.merges[&node];
        self.collect_leaves(m.left, out);
        self.collect_leaves(m.right, out);
    }
}

// --- condensed tree + EOM selection ------------------------------------------

struct ClusterRecord {
    birth_lambda: f64,
    parent: Option<usize>,
}

struct CondenseState {
    next_label: usize,
    clusters: HashMap<usize, ClusterRecord>,
    children: HashMap<usize, Vec<usize>>,
    /// Direct-fall exits: point -> (cluster label it fell from, lambda of death).
    point_exit: HashMap<usize, (usize, f64)>,
    /// Stability accumulator per cluster: sum of (lambda_death - birth).
    stability: HashMap<usize, f64>,
}

impl CondenseState {
    fn new() -> Self {
        Self {
            next_label: 0,
            clusters: HashMap::new(),
            children: HashMap::new(),
            point_exit: HashMap::new(),
            stability: HashMap::new(),
        }
    }

    fn new_cluster(&mut self, birth_lambda: f64, parent: Option<usize>) -> usize {
        let id = self.next_label;
        self.next_label += 1;
        self.clusters.insert(id, ClusterRecord { birth_lambda, parent });
        self.stability.insert(id, 0.0);
        if let Some(p) = parent {
            self.children.entry(p).or_default().push(id);
        }
        id
    }

    fn record_exit(&mut self, point: usize, label: usize, lambda_death: f64) {
        let birth = self.clusters[&label].birth_lambda;
        *self.stability.entry(label).or_insert(0.0) += (lambda_death - birth).max(0.0);
        self.point_exit.insert(point, (label, lambda_death));
    }
}

/// Top-down condensing (spec.md §4.6 step 5). `label = None` means there is
/// no enclosing real cluster yet; a cluster is only created once a split
/// produces at least one side of adequate size.
fn condense(
    node: usize,
    label: Option<usize>,
    birth_lambda: f64,
    tree: &SingleLinkageTree,
    min_cluster_size: usize,
    state: &mut CondenseState,
) {
    if node < tree.n {
        // A bare point reached directly (can only happen for a
        // single-element subtree passed to a discard/collapse call site,
        // handled by the caller via collect_leaves instead).
        if let Some(label) = label {
            state.record_exit(node, label, birth_lambda);
        }
        return;
    }

    let m = &tree.merges[&node];
    let lambda_m = m.lambda;
    let left_big = m.left_size >= min_cluster_size;
    let right_big = m.right_size >= min_cluster_size;

    match (label, left_big, right_big) {
        (_, true, true) => {
            let left_label = state.new_cluster(lambda_m, label);
            let right_label = state.new_cluster(lambda_m, label);
            condense(m.left, Some(left_label), lambda_m, tree, min_cluster_size, state);
            condense(m.right, Some(right_label), lambda_m, tree, min_cluster_size, state);
        }
        (Some(c), true, false) => {
            fall_out(m.right, c, lambda_m, tree, state);
            condense(m.left, Some(c), birth_lambda, tree, min_cluster_size, state);
        }
        (Some(c), false, true) => {
            fall_out(m.left, c, lambda_m, tree, state);
            condense(m.right, Some(c), birth_lambda, tree, min_cluster_size, state);
        }
        (Some(c), false, false) => {
            fall_out(node, c, lambda_m, tree, state);
        }
        (None, true, false) => {
            // The big side is large enough to be a real cluster on its
            // own; it's born here even though it hasn't split further.
            let new_label = state.new_cluster(lambda_m, None);
            condense(m.left, Some(new_label), lambda_m, tree, min_cluster_size, state);
        }
        (None, false, true) => {
            let new_label = state.new_cluster(lambda_m, None);
            condense(m.right, Some(new_label), lambda_m, tree, min_cluster_size, state);
        }
        (None, false, false) => {
            // Neither side ever reaches min_cluster_size: discard, no
            // cluster exists here (spec.md: "collapse chains silently").
        }
    }
}

fn fall_out(node: usize, label: usize, lambda: f64, tree: &SingleLinkageTree, state: &mut CondenseState) {
    let mut leaves = Vec::new();
    tree.collect_leaves(node, &mut leaves);
    for p in leaves {
        state.record_exit(p, label, lambda);
    }
}

/// Excess-of-Mass selection (spec.md §4.6 step 6), bottom-up over the
/// cluster forest (there may be multiple root-level clusters).
fn select_eom(state: &CondenseState) -> (HashMap<usize, bool>, HashMap<usize, f64>) {
    let mut selected = HashMap::new();
    let mut selected_stability = HashMap::new();

    let roots: Vec<usize> = state
        .clusters
        .iter()
        .filter(|(_, rec)| rec.parent.is_none())
        .map(|(id, _)| *id)
        .collect();

    for root in roots {
        resolve(root, state, &mut selected, &mut selected_stability);
    }
    (selected, selected_stability)
}

fn resolve(
    cluster: usize,
    state: &CondenseState,
    selected: &mut HashMap<usize, bool>,
    selected_stability: &mut HashMap<usize, f64>,
) {
    let own_stability = state.stability.get(&cluster).copied().unwrap_or(0.0);
    match state.children.get(&cluster) {
        None => {
            selected.insert(cluster, true);
            selected_stability.insert(cluster, own_stability);
        }
        Some(kids) => {
            let kids = kids.clone();
            let mut children_sum = 0.0;
            for kid in &kids {
                resolve(*kid, state, selected, selected_stability);
                children_sum += selected_stability.get(kid).copied().unwrap_or(0.0);
            }
            if own_stability > children_sum {
                selected.insert(cluster, true);
                selected_stability.insert(cluster, own_stability);
                for kid in &kids {
                    unselect_descendants(*kid, state, selected);
                }
            } else {
                selected.insert(cluster, false);
                selected_stability.insert(cluster, children_sum);
            }
        }
    }
}

fn unselect_descendants(cluster: usize, state: &CondenseState, selected: &mut HashMap<usize, bool>) {
    selected.insert(cluster, false);
    if let Some(kids) = state.children.get(&cluster) {
        for kid in kids {
            unselect_descendants(*kid, state, selected);
        }
    }
}

/// Walks `cluster`'s ancestor chain (inclusive) to the nearest selected
/// cluster. Guaranteed to terminate: EOM selection marks exactly one
/// selected node on every root-to-leaf path.
fn nearest_selected(mut cluster: usize, state: &CondenseState, selected: &HashMap<usize, bool>) -> usize {
    loop {
        if selected.get(&cluster).copied().unwrap_or(false) {
            return cluster;
        }
        match state.clusters[&cluster].parent {
            Some(p) => cluster = p,
            None => return cluster,
        }
    }
}

fn assign_labels(
    n: usize,
    state: &CondenseState,
    selected: &HashMap<usize, bool>,
    selected_stability: &HashMap<usize, f64>,
) -> HdbscanResult {
    // Map each point's direct exit to its nearest selected ancestor.
    let mut point_cluster: Vec<Option<usize>> = vec![None; n];
    let mut point_lambda_death: Vec<f64> = vec![0.0; n];
    for (point, (label, lambda_death)) in &state.point_exit {
        let resolved = nearest_selected(*label, state, selected);
        point_cluster[*point] = Some(resolved);
        point_lambda_death[*point] = *lambda_death;
    }

    // lambda_max per selected cluster: the largest death lambda among its
    // assigned points (spec.md §4.6 step 7's membership-score denominator).
    let mut lambda_max: HashMap<usize, f64> = HashMap::new();
    for (i, c) in point_cluster.iter().enumerate() {
        if let Some(c) = c {
            let entry = lambda_max.entry(*c).or_insert(f64::NEG_INFINITY);
            *entry = entry.max(point_lambda_death[i]);
        }
    }

    // Assign sequential positive integer labels to selected clusters in a
    // deterministic order (ascending internal id).
    let mut ordered: Vec<usize> = selected
        .iter()
        .filter(|(_, sel)| **sel)
        .map(|(id, _)| *id)
        .collect();
    ordered.sort_unstable();
    let display_label: HashMap<usize, i64> = ordered
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, (i + 1) as i64))
        .collect();
    let _ = selected_stability;

    let mut labels = vec![-1i64; n];
    let mut memberships = vec![0.0f64; n];
    for (i, c) in point_cluster.iter().enumerate() {
        let Some(c) = c else { continue };
        let Some(&display) = display_label.get(c) else { continue };
        labels[i] = display;

        let birth = state.clusters[c].birth_lambda;
        let max_lambda = lambda_max[c];
        let death = point_lambda_death[i];
        memberships[i] = if (max_lambda - birth).abs() < f64::EPSILON {
            1.0
        } else {
            ((death - birth) / (max_lambda - birth)).clamp(0.0, 1.0)
        };
    }

    HdbscanResult { labels, memberships }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_point_is_noise() {
        let result = run(&[vec![0.0, 0.0]], HdbscanParams::default());
        assert_eq!(result.labels, vec![-1]);
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let result = run(&[], HdbscanParams::default());
        assert!(result.labels.is_empty());
    }

    #[test]
    fn two_points_below_min_cluster_size_are_both_noise() {
        let points = vec![vec![0.0, 0.0], vec![0.1, 0.1]];
        let result = run(&points, HdbscanParams::default());
        assert_eq!(result.labels, vec![-1, -1]);
    }

    fn blob(cx: f32, cy: f32, n: usize, seed: u32) -> Vec<Vec<f32>> {
        // Deterministic pseudo-jitter, no RNG dependency: a small
        // Halton-like sequence is enough to avoid degenerate coincident
        // points while staying reproducible.
        (0..n)
            .map(|i| {
                let t = (i as u32 + seed) as f32;
                let jitter_x = ((t * 12.9898).sin() * 43758.5453).fract() * 0.2 - 0.1;
                let jitter_y = ((t * 78.233).sin() * 12345.678).fract() * 0.2 - 0.1;
                vec![cx + jitter_x, cy + jitter_y]
            })
            .collect()
    }

    #[test]
    fn two_well_separated_blobs_form_two_clusters() {
        let mut points = blob(0.0, 0.0, 10, 1);
        points.extend(blob(100.0, 100.0, 10, 2));

        let params = HdbscanParams {
            min_cluster_size: 5,
            min_samples: 3,
        };
        let result = run(&points, params);

        let first_half: std::collections::HashSet<i64> = result.labels[..10].iter().copied().collect();
        let second_half: std::collections::HashSet<i64> = result.labels[10..].iter().copied().collect();

        assert_eq!(first_half.len(), 1, "first blob should share one label");
        assert_eq!(second_half.len(), 1, "second blob should share one label");
        assert_ne!(first_half, second_half, "the two blobs should get distinct labels");
        assert!(*first_half.iter().next().unwrap() > 0);
        assert!(*second_half.iter().next().unwrap() > 0);
    }

    #[test]
    fn memberships_are_within_unit_interval() {
        let mut points = blob(0.0, 0.0, 15, 1);
        points.extend(blob(50.0, 50.0, 15, 7));
        let params = HdbscanParams {
            min_cluster_size: 5,
            min_samples: 3,
        };
        let result = run(&points, params);
        for m in &result.memberships {
            assert!(*m >= 0.0 && *m <= 1.0);
        }
    }

    #[test]
    fn deterministic_across_repeated_runs() {
        let mut points = blob(0.0, 0.0, 12, 3);
        points.extend(blob(40.0, 40.0, 12, 9));
        let params = HdbscanParams {
            min_cluster_size: 5,
            min_samples: 3,
        };
        let a = run(&points, params);
        let b = run(&points, params);
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.memberships, b.memberships);
    }
}
