//! Benchmarks the two components spec.md §2 calls out as carrying real
//! computational weight in the path finder: the one-time adjacency
//! precompute (§4.4 step 2) and a subsequent BFS pair query (step 3).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use newsgraph_core::domain::IncidenceRole;
use newsgraph_graph::path::{PathIndex, DEFAULT_DEPTH_CAP, DEFAULT_MAX_PATHS};
use newsgraph_storage::hypergraph::{upsert_edge, upsert_incidence, upsert_node, upsert_provenance};
use newsgraph_storage::Store;

/// Builds a chain of `n` edges, each sharing one node with the next, so
/// adjacency precompute and BFS both have real work to do.
fn seed_chain(store: &Store, n: usize) {
    store
        .write(|tx| {
            tx.execute(
                "INSERT INTO feed_items (id, source_id, guid, title, fetched_at) VALUES ('a1','s','g','t', datetime('now'))",
                [],
            )
            .unwrap();
            for i in 0..=n {
                upsert_node(tx, &format!("N{i}"), &format!("N{i}"))?;
            }
            for i in 0..n {
                let edge_id = format!("E{i}");
                upsert_edge(tx, &edge_id, "r", None)?;
                upsert_incidence(tx, &edge_id, &format!("N{i}"), IncidenceRole::Source, 0)?;
                upsert_incidence(tx, &edge_id, &format!("N{}", i + 1), IncidenceRole::Target, 1)?;
                upsert_provenance(tx, &edge_id, "a1", 0, None)?;
            }
            Ok(())
        })
        .unwrap();
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_index_build");
    for size in [50usize, 200, 500] {
        let store = Store::open_in_memory().unwrap();
        seed_chain(&store, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| store.read(|conn| PathIndex::build(conn, 1)).unwrap());
        });
    }
    group.finish();
}

fn bench_bfs_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_finder_bfs_pair");
    for size in [50usize, 200, 500] {
        let store = Store::open_in_memory().unwrap();
        seed_chain(&store, size);
        let index = store.read(|conn| PathIndex::build(conn, 1)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                index.find_paths(
                    &["N0".to_string(), format!("N{size}")],
                    DEFAULT_DEPTH_CAP,
                    DEFAULT_MAX_PATHS,
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_index_build, bench_bfs_pair);
criterion_main!(benches);
