//! Distance metrics supported by the forest engine

use crate::error::{AnnoyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance spaces an index can be built in.
///
/// All metrics report non-negative magnitudes in their native scale; callers
/// never need to post-process a returned distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Euclidean distance between the normalized vectors, `sqrt(2 - 2cos)`
    Angular,
    /// Euclidean (L2) distance
    Euclidean,
    /// Manhattan (L1) distance
    Manhattan,
    /// Number of differing bits between binarized vectors
    Hamming,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Angular,
        Metric::Euclidean,
        Metric::Manhattan,
        Metric::Hamming,
    ];

    /// The name written to the `metric` file of a saved index.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Angular => "Angular",
            Metric::Euclidean => "Euclidean",
            Metric::Manhattan => "Manhattan",
            Metric::Hamming => "Hamming",
        }
    }

    /// Compute the distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Angular => angular_distance(a, b),
            Metric::Euclidean => euclidean_distance(a, b),
            Metric::Manhattan => manhattan_distance(a, b),
            Metric::Hamming => hamming_distance(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = AnnoyError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| AnnoyError::corrupt(format!("unknown metric name: {:?}", s)))
    }
}

/// Euclidean distance between the unit-normalized vectors.
///
/// A zero vector is treated as orthogonal to everything.
pub fn angular_distance(a: &[f32], b: &[f32]) -> f32 {
    let pp = dot_product(a, a);
    let qq = dot_product(b, b);
    let pq = dot_product(a, b);
    let ppqq = pp * qq;
    let cos = if ppqq > 0.0 { pq / ppqq.sqrt() } else { 0.0 };
    (2.0 - 2.0 * cos).max(0.0).sqrt()
}

/// Compute Euclidean (L2) distance between two vectors
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Compute Manhattan (L1) distance between two vectors
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Count the components whose binarized values differ.
pub fn hamming_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .filter(|(x, y)| is_set(**x) != is_set(**y))
        .count() as f32
}

/// Compute dot product of two vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Bit value of a component in a Hamming space.
pub fn is_set(x: f32) -> bool {
    x > 0.5
}
