//! Recall tests: compare forest search against brute-force ground truth.

use std::collections::HashSet;

use forest_index::{AnnoyIndex, BuildOptions, IdentifiedVector, Metric};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_vectors(rng: &mut StdRng, n: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
        .collect()
}

fn brute_force(metric: Metric, vectors: &[Vec<f32>], query: &[f32], k: usize) -> HashSet<usize> {
    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, metric.distance(query, v)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(k).map(|(i, _)| i).collect()
}

struct Fixture {
    metric: Metric,
    vectors: Vec<Vec<f32>>,
    queries: Vec<Vec<f32>>,
    index: AnnoyIndex<usize>,
}

fn fixture(metric: Metric, n: usize, dim: usize, trees: usize) -> Fixture {
    let mut rng = StdRng::seed_from_u64(42);
    let vectors = random_vectors(&mut rng, n, dim);
    let queries = random_vectors(&mut rng, 20, dim);
    let index = AnnoyIndex::build(
        vectors.iter().cloned().enumerate().map(IdentifiedVector::from),
        &BuildOptions::new(trees, metric),
    )
    .unwrap();
    Fixture {
        metric,
        vectors,
        queries,
        index,
    }
}

impl Fixture {
    /// True top-k neighbors found per query at the given budget.
    fn hits(&self, k: usize, budget: Option<usize>) -> Vec<usize> {
        self.queries
            .iter()
            .map(|q| {
                let truth = brute_force(self.metric, &self.vectors, q, k);
                self.index
                    .query_by_vector(q, k, budget)
                    .unwrap()
                    .iter()
                    .filter(|n| truth.contains(&n.id))
                    .count()
            })
            .collect()
    }

    fn recall(&self, k: usize, budget: Option<usize>) -> f64 {
        let found: usize = self.hits(k, budget).iter().sum();
        found as f64 / (k * self.queries.len()) as f64
    }
}

#[test]
fn test_recall_euclidean() {
    let f = fixture(Metric::Euclidean, 1000, 16, 10);
    let recall = f.recall(10, Some(3000));
    assert!(recall >= 0.8, "Recall {:.3} is below threshold 0.800", recall);
}

#[test]
fn test_recall_angular() {
    let f = fixture(Metric::Angular, 1000, 16, 10);
    let recall = f.recall(10, Some(3000));
    assert!(recall >= 0.8, "Recall {:.3} is below threshold 0.800", recall);
}

#[test]
fn test_exhaustive_budget_is_exact() {
    for metric in [Metric::Euclidean, Metric::Manhattan] {
        let f = fixture(metric, 300, 8, 5);
        // Every leaf of every tree is visited.
        let recall = f.recall(10, Some(300 * 5));
        assert_eq!(recall, 1.0, "{}", metric);
    }
}

#[test]
fn test_higher_budget_never_loses_neighbors() {
    let f = fixture(Metric::Euclidean, 2000, 24, 8);
    let budgets = [Some(10), Some(100), Some(500), Some(2000), Some(8000), Some(16000)];
    let per_budget: Vec<Vec<usize>> = budgets.iter().map(|b| f.hits(10, *b)).collect();

    for pair in per_budget.windows(2) {
        for (query, (low, high)) in pair[0].iter().zip(&pair[1]).enumerate() {
            assert!(high >= low, "query {} lost neighbors: {} -> {}", query, low, high);
        }
    }
    let last = &per_budget[per_budget.len() - 1];
    assert!(last.iter().all(|&found| found == 10));
}

#[test]
fn test_default_budget_returns_full_results() {
    let f = fixture(Metric::Angular, 500, 12, 10);
    for q in &f.queries {
        let results = f.index.query_by_vector(q, 10, None).unwrap();
        assert_eq!(results.len(), 10);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }
}
