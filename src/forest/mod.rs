//! Random-projection forest: the default [`Engine`] implementation.
//!
//! Items are staged by dense position, frozen into `n_trees` trees by
//! [`Engine::build`], then searched with a single priority queue shared by
//! all trees. Candidates collected from the leaves are re-ranked with exact
//! distances.

pub mod blob;
pub mod queue;
pub mod tree;

use std::collections::HashSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::engine::Engine;
use crate::error::{AnnoyError, Result};
use crate::metric::{self, Metric};

use self::queue::NodeQueue;
use self::tree::{Node, SplitParams, TreeBuilder};

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 0x5eed_f0e5;

/// Tunables for tree construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestParams {
    /// Largest leaf; `None` means `dimension + 2`.
    pub max_leaf_size: Option<usize>,
    /// Hyperplanes tried before falling back to a random split.
    pub split_attempts: usize,
    /// Sampling steps of the two-means centroid search.
    pub two_means_iterations: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            max_leaf_size: None,
            split_attempts: 3,
            two_means_iterations: 200,
        }
    }
}

/// A forest of random-projection trees over one metric space.
#[derive(Debug)]
pub struct Forest {
    metric: Metric,
    dimension: usize,
    params: ForestParams,
    /// Stored vectors by position; Hamming vectors are kept binarized.
    items: Vec<Option<Vec<f32>>>,
    nodes: Vec<Node>,
    roots: Vec<u32>,
    built: bool,
    verbose: bool,
    seed: u64,
}

impl Forest {
    pub fn with_params(metric: Metric, dimension: usize, params: ForestParams) -> Self {
        Self {
            metric,
            dimension,
            params,
            items: Vec::new(),
            nodes: Vec::new(),
            roots: Vec::new(),
            built: false,
            verbose: false,
            seed: DEFAULT_SEED,
        }
    }

    pub fn angular(dimension: usize) -> Self {
        Self::with_params(Metric::Angular, dimension, ForestParams::default())
    }

    pub fn euclidean(dimension: usize) -> Self {
        Self::with_params(Metric::Euclidean, dimension, ForestParams::default())
    }

    pub fn manhattan(dimension: usize) -> Self {
        Self::with_params(Metric::Manhattan, dimension, ForestParams::default())
    }

    pub fn hamming(dimension: usize) -> Self {
        Self::with_params(Metric::Hamming, dimension, ForestParams::default())
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    fn max_leaf_size(&self) -> usize {
        self.params
            .max_leaf_size
            .unwrap_or(self.dimension + 2)
            .max(1)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(AnnoyError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn stored(&self, position: usize) -> Option<&[f32]> {
        self.items.get(position).and_then(|v| v.as_deref())
    }

    /// Walk all trees best-first until `search_k` candidates are collected,
    /// then rank the candidates by exact distance and fill the buffers.
    ///
    /// `origin` is the queried item of a by-item search. It is always a
    /// candidate and ranks first among items at its distance.
    fn search(
        &self,
        query: &[f32],
        origin: Option<u32>,
        search_k: Option<usize>,
        result: &mut [i32],
        distances: &mut [f32],
    ) -> Result<()> {
        if !self.built {
            return Err(AnnoyError::invalid("forest has not been built"));
        }
        let n = result.len().min(distances.len());
        if n == 0 {
            return Ok(());
        }

        let search_k = match search_k {
            Some(k) if k > 0 => k,
            _ => self.roots.len() * n,
        };

        let mut queue = NodeQueue::new();
        for &root in &self.roots {
            queue.push(root, f32::INFINITY);
        }

        // Leaf hits count towards search_k even when several trees return
        // the same position.
        let mut candidates = Vec::new();
        while candidates.len() < search_k {
            let Some(top) = queue.pop() else { break };
            let node = &self.nodes[top.node as usize];
            match node {
                Node::Leaf { items } => candidates.extend_from_slice(items),
                Node::Plane { left, right, .. } | Node::Bit { left, right, .. } => {
                    let margin = node.margin(query);
                    queue.push(*right, top.priority.min(margin));
                    queue.push(*left, top.priority.min(-margin));
                }
            }
        }
        candidates.extend(origin);

        let mut seen = HashSet::with_capacity(candidates.len());
        let scored: Vec<(u32, f32)> = candidates
            .into_iter()
            .filter(|p| seen.insert(*p))
            .filter_map(|p| {
                self.stored(p as usize)
                    .map(|v| (p, self.metric.distance(query, v)))
            })
            .collect();
        let top = queue::nearest(scored, n, origin);

        for (slot, (position, distance)) in top.into_iter().enumerate() {
            result[slot] = position as i32;
            distances[slot] = distance;
        }
        Ok(())
    }
}

impl Engine for Forest {
    fn create(metric: Metric, dimension: usize) -> Self {
        match metric {
            Metric::Angular => Forest::angular(dimension),
            Metric::Euclidean => Forest::euclidean(dimension),
            Metric::Manhattan => Forest::manhattan(dimension),
            Metric::Hamming => Forest::hamming(dimension),
        }
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn add_item(&mut self, position: usize, vector: &[f32]) -> Result<()> {
        if self.built {
            return Err(AnnoyError::invalid("cannot add items after build"));
        }
        if position > i32::MAX as usize {
            return Err(AnnoyError::invalid(format!(
                "position {} exceeds the addressable range",
                position
            )));
        }
        self.check_dimension(vector)?;

        let stored = match self.metric {
            Metric::Hamming => vector
                .iter()
                .map(|&x| if metric::is_set(x) { 1.0 } else { 0.0 })
                .collect(),
            _ => vector.to_vec(),
        };
        if position >= self.items.len() {
            self.items.resize(position + 1, None);
        }
        self.items[position] = Some(stored);
        Ok(())
    }

    fn build(&mut self, n_trees: usize) -> Result<()> {
        if self.built {
            return Err(AnnoyError::invalid("forest is already built"));
        }
        if n_trees == 0 {
            return Err(AnnoyError::invalid("tree count must be positive"));
        }

        let positions: Vec<u32> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(p, _)| p as u32)
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut builder = TreeBuilder {
            metric: self.metric,
            dimension: self.dimension,
            params: SplitParams {
                max_leaf_size: self.max_leaf_size(),
                split_attempts: self.params.split_attempts,
                two_means_iterations: self.params.two_means_iterations,
            },
            items: &self.items,
            nodes: &mut self.nodes,
            rng: &mut rng,
        };

        let mut roots = Vec::with_capacity(n_trees);
        for pass in 0..n_trees {
            roots.push(builder.build_tree(positions.clone()));
            if self.verbose {
                tracing::info!(pass, nodes = builder.nodes.len(), "tree built");
            }
        }
        self.roots = roots;
        self.built = true;

        if self.verbose {
            tracing::info!(
                items = positions.len(),
                trees = n_trees,
                nodes = self.nodes.len(),
                "forest built"
            );
        }
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        if !self.built {
            return Err(AnnoyError::invalid("cannot save a forest that has not been built"));
        }
        let snapshot = blob::SnapshotRef::new(
            self.metric,
            self.dimension,
            &self.items,
            &self.nodes,
            &self.roots,
        );
        let bytes = blob::write(path, &snapshot)?;
        if self.verbose {
            tracing::info!(path = %path.display(), bytes, "forest saved");
        }
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let snapshot = blob::read(path)?;
        if snapshot.metric != self.metric {
            return Err(AnnoyError::corrupt(format!(
                "blob holds a {} forest, expected {}",
                snapshot.metric, self.metric
            )));
        }
        if snapshot.dimension != self.dimension {
            return Err(AnnoyError::DimensionMismatch {
                expected: self.dimension,
                actual: snapshot.dimension,
            });
        }

        self.items = snapshot.items;
        self.nodes = snapshot.nodes;
        self.roots = snapshot.roots;
        self.built = true;
        if self.verbose {
            tracing::info!(
                path = %path.display(),
                items = self.items.len(),
                trees = self.roots.len(),
                "forest loaded"
            );
        }
        Ok(())
    }

    fn unload(&mut self) {
        self.items = Vec::new();
        self.nodes = Vec::new();
        self.roots = Vec::new();
        self.built = false;
    }

    fn distance(&self, i: usize, j: usize) -> Option<f32> {
        let a = self.stored(i)?;
        let b = self.stored(j)?;
        Some(self.metric.distance(a, b))
    }

    fn nns_by_item(
        &self,
        position: usize,
        search_k: Option<usize>,
        result: &mut [i32],
        distances: &mut [f32],
    ) -> Result<()> {
        let query = self
            .stored(position)
            .ok_or_else(|| AnnoyError::invalid(format!("no item at position {}", position)))?;
        self.search(query, Some(position as u32), search_k, result, distances)
    }

    fn nns_by_vector(
        &self,
        vector: &[f32],
        search_k: Option<usize>,
        result: &mut [i32],
        distances: &mut [f32],
    ) -> Result<()> {
        self.check_dimension(vector)?;
        self.search(vector, None, search_k, result, distances)
    }

    fn item(&self, position: usize, out: &mut [f32]) {
        if let Some(v) = self.stored(position) {
            let n = out.len().min(v.len());
            out[..n].copy_from_slice(&v[..n]);
        }
    }

    fn n_items(&self) -> usize {
        self.items.len()
    }

    fn n_trees(&self) -> usize {
        self.roots.len()
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }
}
