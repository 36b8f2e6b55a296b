//! Typed ANN index: maps caller identifiers onto the dense positions of an
//! engine and shapes the engine's raw results.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::engine::{Engine, EngineHandle, NO_COMPONENT, NO_DISTANCE, NO_ITEM};
use crate::error::{AnnoyError, Result};
use crate::forest::{Forest, DEFAULT_SEED};
use crate::metric::Metric;
use crate::persistence::layout;
use crate::persistence::IdentifierCodec;
use crate::vector::IdentifiedVector;

/// Configuration for building an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Number of trees; more trees give better recall at the cost of memory
    /// and build time.
    pub tree_count: usize,
    /// Distance metric.
    pub metric: Metric,
    /// Let the engine log its progress.
    pub verbose: bool,
    /// Seed for the engine's random source.
    pub seed: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tree_count: 10,
            metric: Metric::Angular,
            verbose: false,
            seed: DEFAULT_SEED,
        }
    }
}

impl BuildOptions {
    pub fn new(tree_count: usize, metric: Metric) -> Self {
        Self {
            tree_count,
            metric,
            ..Self::default()
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A query result: an identifier and its distance from the query
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<T> {
    pub id: T,
    pub distance: f32,
}

/// A built (or loaded) index over identifiers of type `T`.
///
/// Position `i` in the engine always holds the vector of `identifiers()[i]`.
/// When an identifier occurs more than once, lookups by identifier resolve
/// to its last position; the earlier copies are still returned by queries.
#[derive(Debug)]
pub struct AnnoyIndex<T, E: Engine = Forest> {
    positions: Vec<T>,
    index_of: HashMap<T, usize>,
    dimension: usize,
    metric: Metric,
    handle: EngineHandle<E>,
}

impl<T, E> AnnoyIndex<T, E>
where
    T: Eq + Hash + Clone,
    E: Engine,
{
    /// Build an index over `items`, in iteration order.
    ///
    /// The dimension is taken from the first item; the engine rejects any
    /// later item of a different length.
    pub fn build<I>(items: I, options: &BuildOptions) -> Result<Self>
    where
        I: IntoIterator<Item = IdentifiedVector<T>>,
    {
        if options.tree_count == 0 {
            return Err(AnnoyError::invalid("tree count must be positive"));
        }

        let mut items = items.into_iter().peekable();
        let dimension = match items.peek() {
            Some(first) => first.dimension(),
            None => return Err(AnnoyError::invalid("input is empty")),
        };
        if dimension == 0 {
            return Err(AnnoyError::invalid("vectors must have at least one component"));
        }

        let mut handle = EngineHandle::<E>::create(options.metric, dimension);
        let engine = handle.get_mut()?;
        engine.set_verbose(options.verbose);
        engine.set_seed(options.seed);

        // Engine positions and the identifier list come from the same pass.
        let mut positions = Vec::new();
        for (position, item) in items.enumerate() {
            engine.add_item(position, &item.vector)?;
            positions.push(item.id);
        }
        engine.build(options.tree_count)?;

        tracing::debug!(
            items = positions.len(),
            dimension,
            metric = %options.metric,
            trees = options.tree_count,
            "index built"
        );
        Ok(Self::from_parts(positions, dimension, options.metric, handle))
    }

    /// Build an index and, when `output_dir` is given, save it there.
    ///
    /// A codec is required whenever an output directory is given. Both are
    /// checked before any work is done.
    pub fn build_and_save<I>(
        items: I,
        options: &BuildOptions,
        output_dir: Option<&Path>,
        codec: Option<&dyn IdentifierCodec<T>>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = IdentifiedVector<T>>,
    {
        let target = match output_dir {
            Some(dir) => {
                let codec = codec.ok_or_else(|| {
                    AnnoyError::invalid("an identifier codec is required to save the index")
                })?;
                layout::prepare_dir(dir)?;
                Some((dir, codec))
            }
            None => None,
        };

        let index = Self::build(items, options)?;
        if let Some((dir, codec)) = target {
            index.save(dir, codec)?;
        }
        Ok(index)
    }

    /// Load an index saved with [`AnnoyIndex::save`].
    pub fn load<C>(dir: impl AsRef<Path>, codec: &C) -> Result<Self>
    where
        C: IdentifierCodec<T> + ?Sized,
    {
        let dir = dir.as_ref();
        let manifest = layout::read_manifest(dir, codec)?;

        let mut handle = EngineHandle::<E>::create(manifest.metric, manifest.dimension);
        let blob = layout::blob_path(dir)?;
        handle
            .get_mut()?
            .load(&blob)
            .map_err(|e| engine_failure("load", blob, e))?;

        tracing::debug!(
            dir = %dir.display(),
            items = manifest.ids.len(),
            dimension = manifest.dimension,
            metric = %manifest.metric,
            "index loaded"
        );
        Ok(Self::from_parts(
            manifest.ids,
            manifest.dimension,
            manifest.metric,
            handle,
        ))
    }

    fn from_parts(positions: Vec<T>, dimension: usize, metric: Metric, handle: EngineHandle<E>) -> Self {
        let index_of = positions
            .iter()
            .enumerate()
            .fold(HashMap::with_capacity(positions.len()), |mut map, (i, id)| {
                map.insert(id.clone(), i);
                map
            });
        Self {
            positions,
            index_of,
            dimension,
            metric,
            handle,
        }
    }

    /// Write the index into `dir`, creating it if needed.
    pub fn save<C>(&self, dir: impl AsRef<Path>, codec: &C) -> Result<()>
    where
        C: IdentifierCodec<T> + ?Sized,
    {
        let dir = dir.as_ref();
        let engine = self.handle.get()?;
        layout::prepare_dir(dir)?;
        layout::write_manifest(dir, &self.positions, self.dimension, self.metric, codec)?;

        let blob = layout::blob_path(dir)?;
        engine
            .save(&blob)
            .map_err(|e| engine_failure("save", blob, e))?;

        tracing::debug!(dir = %dir.display(), items = self.positions.len(), "index saved");
        Ok(())
    }

    /// The `max_results` nearest identifiers to `vector`, nearest first.
    ///
    /// Fewer results come back when the engine finds fewer neighbors.
    /// `search_budget` of `None` lets the engine choose its effort.
    pub fn query_by_vector(
        &self,
        vector: &[f32],
        max_results: usize,
        search_budget: Option<usize>,
    ) -> Result<Vec<Neighbor<T>>> {
        let engine = self.handle.get()?;
        let mut result = vec![NO_ITEM; max_results];
        let mut distances = vec![NO_DISTANCE; max_results];
        engine.nns_by_vector(vector, search_budget, &mut result, &mut distances)?;
        Ok(self.shape(&result, &distances))
    }

    /// The `max_results` nearest identifiers to the vector stored for `id`.
    ///
    /// `id` itself is part of the result, first, at distance zero; other
    /// items with an identical vector follow it. Returns `Ok(None)` when `id`
    /// is not in the index, or when the engine holds no vector at its
    /// position (an `ids` file longer than the engine blob).
    pub fn query_by_identifier(
        &self,
        id: &T,
        max_results: usize,
        search_budget: Option<usize>,
    ) -> Result<Option<Vec<Neighbor<T>>>> {
        let engine = self.handle.get()?;
        let Some(&position) = self.index_of.get(id) else {
            return Ok(None);
        };
        if stored_vector(engine, position, self.dimension).is_none() {
            tracing::warn!(position, "identifier has no vector in the engine");
            return Ok(None);
        }

        let mut result = vec![NO_ITEM; max_results];
        let mut distances = vec![NO_DISTANCE; max_results];
        engine.nns_by_item(position, search_budget, &mut result, &mut distances)?;
        Ok(Some(self.shape(&result, &distances)))
    }

    /// Run several vector queries in parallel.
    pub fn query_batch(
        &self,
        queries: &[Vec<f32>],
        max_results: usize,
        search_budget: Option<usize>,
    ) -> Result<Vec<Vec<Neighbor<T>>>>
    where
        T: Send + Sync,
        E: Sync,
    {
        self.handle.get()?;
        queries
            .par_iter()
            .map(|q| self.query_by_vector(q, max_results, search_budget))
            .collect()
    }

    /// The vector stored for `id`, or `None` when `id` is unknown or the
    /// engine has nothing stored at its position.
    pub fn get_vector(&self, id: &T) -> Result<Option<Vec<f32>>> {
        let engine = self.handle.get()?;
        let Some(&position) = self.index_of.get(id) else {
            return Ok(None);
        };

        Ok(stored_vector(engine, position, self.dimension))
    }

    /// Distance between the vectors stored for two identifiers.
    pub fn distance(&self, a: &T, b: &T) -> Result<Option<f32>> {
        let engine = self.handle.get()?;
        match (self.index_of.get(a), self.index_of.get(b)) {
            (Some(&i), Some(&j)) => Ok(engine.distance(i, j)),
            _ => Ok(None),
        }
    }

    /// Release the engine. Every later call fails with `Disposed`; calling
    /// this twice is a no-op.
    pub fn dispose(&mut self) {
        if self.handle.release() {
            tracing::debug!(items = self.positions.len(), "index disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_released()
    }

    /// Identifiers in position order.
    pub fn identifiers(&self) -> &[T] {
        &self.positions
    }

    /// The position an identifier resolves to.
    pub fn position_of(&self, id: &T) -> Option<usize> {
        self.index_of.get(id).copied()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn n_trees(&self) -> Result<usize> {
        Ok(self.handle.get()?.n_trees())
    }

    /// Drop sentinel slots and translate positions back to identifiers.
    fn shape(&self, result: &[i32], distances: &[f32]) -> Vec<Neighbor<T>> {
        result
            .iter()
            .zip(distances.iter())
            .filter(|(position, _)| **position != NO_ITEM)
            .filter_map(|(&position, &distance)| {
                let id = usize::try_from(position)
                    .ok()
                    .and_then(|p| self.positions.get(p));
                if id.is_none() {
                    tracing::warn!(position, "engine returned a position without an identifier");
                }
                id.map(|id| Neighbor {
                    id: id.clone(),
                    distance,
                })
            })
            .collect()
    }
}

/// Read the vector at `position`; `None` if the engine left every slot at
/// the sentinel.
fn stored_vector<E: Engine>(engine: &E, position: usize, dimension: usize) -> Option<Vec<f32>> {
    let mut vector = vec![NO_COMPONENT; dimension];
    engine.item(position, &mut vector);
    if vector.iter().all(|&x| x == NO_COMPONENT) {
        None
    } else {
        Some(vector)
    }
}

fn engine_failure(op: &'static str, path: PathBuf, err: AnnoyError) -> AnnoyError {
    tracing::warn!(op, path = %path.display(), error = %err, "engine persistence failed");
    AnnoyError::EngineFailure {
        op,
        path,
        reason: err.to_string(),
    }
}
