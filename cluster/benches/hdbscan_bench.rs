//! Benchmarks the pure-numeric HDBSCAN run (spec.md §4.6) across a range
//! of event counts, since it is the one CPU-bound kernel in the
//! clustering pipeline without an external library to lean on.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use newsgraph_cluster::hdbscan::{self, HdbscanParams};

/// Deterministic pseudo-jitter blobs, matching the approach used in
/// `hdbscan`'s own unit tests: no RNG dependency, reproducible across runs.
fn blob(cx: f32, cy: f32, n: usize, seed: u32) -> Vec<Vec<f32>> {
    (0..n)
        .map(|i| {
            let t = (i as u32 + seed) as f32;
            let jitter_x = ((t * 12.9898).sin() * 43758.5453).fract() * 0.2 - 0.1;
            let jitter_y = ((t * 78.233).sin() * 12345.678).fract() * 0.2 - 0.1;
            vec![cx + jitter_x, cy + jitter_y]
        })
        .collect()
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("hdbscan_run");
    for size in [50usize, 200, 500] {
        let half = size / 2;
        let mut points = blob(0.0, 0.0, half, 1);
        points.extend(blob(100.0, 100.0, size - half, 2));
        let params = HdbscanParams {
            min_cluster_size: 10,
            min_samples: 5,
        };
        group.bench_with_input(BenchmarkId::from_parameter(size), &points, |b, points| {
            b.iter(|| hdbscan::run(points, params));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_run);
criterion_main!(benches);
