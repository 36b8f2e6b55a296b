//! Engine call surface and the owning handle around it.
//!
//! The index layer only talks to an ANN engine through [`Engine`]. Results
//! come back through caller-allocated buffers padded with sentinels, so the
//! index decides how to shape them.

use std::path::Path;

use crate::error::{AnnoyError, Result};
use crate::metric::Metric;

/// Position slot the engine did not fill.
pub const NO_ITEM: i32 = -1;

/// Distance slot the engine did not fill.
pub const NO_DISTANCE: f32 = -1.0;

/// Vector component the engine did not fill.
pub const NO_COMPONENT: f32 = f32::NEG_INFINITY;

/// A build-once, query-many ANN engine addressed by dense integer positions.
pub trait Engine {
    /// Create an empty engine for the given metric and vector length.
    fn create(metric: Metric, dimension: usize) -> Self
    where
        Self: Sized;

    /// The metric this engine was created for.
    fn metric(&self) -> Metric;

    /// The vector length this engine was created for.
    fn dimension(&self) -> usize;

    /// Stage an item at `position`. Only valid before [`Engine::build`].
    fn add_item(&mut self, position: usize, vector: &[f32]) -> Result<()>;

    /// Freeze the staged items into `n_trees` trees. Irreversible.
    fn build(&mut self, n_trees: usize) -> Result<()>;

    /// Write the built structure to `path`.
    fn save(&self, path: &Path) -> Result<()>;

    /// Replace this engine's contents with the structure stored at `path`.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Drop all items and trees.
    fn unload(&mut self);

    /// Distance between two stored positions, if both exist.
    fn distance(&self, i: usize, j: usize) -> Option<f32>;

    /// Fill up to `result.len()` neighbors of the item at `position`.
    ///
    /// Unfilled slots keep whatever the caller put there. `search_k` of `None`
    /// lets the engine pick its default effort.
    fn nns_by_item(
        &self,
        position: usize,
        search_k: Option<usize>,
        result: &mut [i32],
        distances: &mut [f32],
    ) -> Result<()>;

    /// Fill up to `result.len()` neighbors of `vector`.
    fn nns_by_vector(
        &self,
        vector: &[f32],
        search_k: Option<usize>,
        result: &mut [i32],
        distances: &mut [f32],
    ) -> Result<()>;

    /// Copy the stored vector at `position` into `out`, if there is one.
    fn item(&self, position: usize, out: &mut [f32]);

    /// Number of addressable positions.
    fn n_items(&self) -> usize;

    /// Number of trees in the built structure.
    fn n_trees(&self) -> usize;

    /// Toggle progress logging.
    fn set_verbose(&mut self, verbose: bool);

    /// Seed the engine's random source. Must be called before build.
    fn set_seed(&mut self, seed: u64);
}

/// Exclusive owner of one engine instance.
///
/// The engine is released exactly once: by [`EngineHandle::release`] or when
/// the handle is dropped, whichever comes first.
#[derive(Debug)]
pub struct EngineHandle<E: Engine> {
    engine: Option<E>,
}

impl<E: Engine> EngineHandle<E> {
    /// Create a handle around a freshly constructed engine.
    pub fn create(metric: Metric, dimension: usize) -> Self {
        tracing::trace!(%metric, dimension, "engine handle acquired");
        Self {
            engine: Some(E::create(metric, dimension)),
        }
    }

    pub fn get(&self) -> Result<&E> {
        self.engine.as_ref().ok_or(AnnoyError::Disposed)
    }

    pub fn get_mut(&mut self) -> Result<&mut E> {
        self.engine.as_mut().ok_or(AnnoyError::Disposed)
    }

    /// Release the engine. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        match self.engine.take() {
            Some(mut engine) => {
                engine.unload();
                tracing::trace!(metric = %engine.metric(), "engine handle released");
                true
            }
            None => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.engine.is_none()
    }
}

impl<E: Engine> Drop for EngineHandle<E> {
    fn drop(&mut self) {
        self.release();
    }
}
