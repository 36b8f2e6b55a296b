//! Forest construction benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use forest_index::{AnnoyIndex, BuildOptions, IdentifiedVector, Metric};

fn create_random_items(n: usize, dim: usize) -> Vec<IdentifiedVector<usize>> {
    (0..n)
        .map(|i| {
            let data: Vec<f32> = (0..dim).map(|_| rand::random::<f32>()).collect();
            IdentifiedVector::new(i, data)
        })
        .collect()
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for metric in [Metric::Angular, Metric::Euclidean, Metric::Hamming] {
        let items = create_random_items(5_000, 64);
        group.bench_with_input(BenchmarkId::new(metric.name(), 5_000), &items, |b, items| {
            b.iter(|| {
                AnnoyIndex::<usize>::build(
                    black_box(items.clone()),
                    &BuildOptions::new(10, metric),
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_tree_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_count");
    group.sample_size(10);
    let items = create_random_items(5_000, 32);

    for trees in [1, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(trees), &trees, |b, &trees| {
            b.iter(|| {
                AnnoyIndex::<usize>::build(
                    items.clone(),
                    &BuildOptions::new(trees, Metric::Euclidean),
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_build, benchmark_tree_count);
criterion_main!(benches);
