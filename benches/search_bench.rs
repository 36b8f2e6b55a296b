//! Benchmarks for index queries

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

fn benchmark_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for size in [1_000, 10_000].iter() {
        let index: AnnoyIndex<usize> = AnnoyIndex::build(
            create_random_items(*size, 128),
            &BuildOptions::new(10, Metric::Angular),
        )
        .unwrap();
        let query = vec![0.5; 128];

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                index
                    .query_by_vector(black_box(&query), black_box(10), None)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_search_budget(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_budget");
    let index: AnnoyIndex<usize> = AnnoyIndex::build(
        create_random_items(10_000, 64),
        &BuildOptions::new(10, Metric::Euclidean),
    )
    .unwrap();
    let query = vec![0.5; 64];

    for budget in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(budget), &budget, |b, &budget| {
            b.iter(|| {
                index
                    .query_by_vector(black_box(&query), 10, Some(budget))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_query_batch(c: &mut Criterion) {
    let index: AnnoyIndex<usize> = AnnoyIndex::build(
        create_random_items(10_000, 64),
        &BuildOptions::new(10, Metric::Euclidean),
    )
    .unwrap();
    let queries: Vec<Vec<f32>> = create_random_items(100, 64)
        .into_iter()
        .map(|item| item.vector)
        .collect();

    c.bench_function("query_batch_100", |b| {
        b.iter(|| index.query_batch(black_box(&queries), 10, None).unwrap());
    });
}

criterion_group!(
    benches,
    benchmark_search,
    benchmark_search_budget,
    benchmark_query_batch
);
criterion_main!(benches);
