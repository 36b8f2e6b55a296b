//! Random-projection tree construction.
//!
//! Every tree recursively splits its item set with a hyperplane until a node
//! holds at most `max_leaf_size` items. All trees of a forest share one node
//! arena.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::metric::{self, Metric};
use crate::vector::normalize;

/// A node in the forest arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Positions stored under this node.
    Leaf { items: Vec<u32> },
    /// Items with `offset + normal · v > 0` go right. A zero normal marks a
    /// random split, where the query visits both sides with equal priority.
    Plane {
        normal: Vec<f32>,
        offset: f32,
        left: u32,
        right: u32,
    },
    /// Items with bit `dim` set go right.
    Bit { dim: u32, left: u32, right: u32 },
}

impl Node {
    /// Signed distance of `v` from the split; positive means the right side.
    pub fn margin(&self, v: &[f32]) -> f32 {
        match self {
            Node::Leaf { .. } => 0.0,
            Node::Plane { normal, offset, .. } => offset + metric::dot_product(normal, v),
            Node::Bit { dim, .. } => {
                if metric::is_set(v[*dim as usize]) {
                    0.5
                } else {
                    -0.5
                }
            }
        }
    }
}

/// Split tunables.
#[derive(Debug, Clone, Copy)]
pub struct SplitParams {
    pub max_leaf_size: usize,
    pub split_attempts: usize,
    pub two_means_iterations: usize,
}

/// Builds trees into a shared node arena.
pub struct TreeBuilder<'a> {
    pub metric: Metric,
    pub dimension: usize,
    pub params: SplitParams,
    pub items: &'a [Option<Vec<f32>>],
    pub nodes: &'a mut Vec<Node>,
    pub rng: &'a mut StdRng,
}

enum Split {
    Plane { normal: Vec<f32>, offset: f32 },
    Bit { dim: u32 },
}

impl Split {
    fn goes_right(&self, v: &[f32]) -> bool {
        match self {
            Split::Plane { normal, offset } => offset + metric::dot_product(normal, v) > 0.0,
            Split::Bit { dim } => metric::is_set(v[*dim as usize]),
        }
    }
}

impl<'a> TreeBuilder<'a> {
    /// Build one tree over `positions` and return its root node index.
    pub fn build_tree(&mut self, positions: Vec<u32>) -> u32 {
        if positions.len() <= self.params.max_leaf_size {
            return self.push(Node::Leaf { items: positions });
        }

        let (split, left, right) = self.partition(&positions);
        let left = self.build_tree(left);
        let right = self.build_tree(right);
        let node = match split {
            Split::Plane { normal, offset } => Node::Plane {
                normal,
                offset,
                left,
                right,
            },
            Split::Bit { dim } => Node::Bit { dim, left, right },
        };
        self.push(node)
    }

    fn push(&mut self, node: Node) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    fn vector(&self, position: u32) -> &'a [f32] {
        stored(self.items, position)
    }

    /// Pick a split and divide `positions`; both halves are non-empty.
    fn partition(&mut self, positions: &[u32]) -> (Split, Vec<u32>, Vec<u32>) {
        for _ in 0..self.params.split_attempts {
            let split = match self.metric {
                Metric::Hamming => match self.bit_split(positions) {
                    Some(split) => split,
                    None => break,
                },
                _ => self.plane_split(positions),
            };
            let (left, right): (Vec<u32>, Vec<u32>) = positions
                .iter()
                .partition(|&&p| !split.goes_right(self.vector(p)));
            if !is_imbalanced(left.len(), right.len()) {
                return (split, left, right);
            }
        }

        // Random halving; the query cannot tell the sides apart.
        let mut shuffled = positions.to_vec();
        shuffled.shuffle(&mut *self.rng);
        let right = shuffled.split_off(shuffled.len() / 2);
        let split = Split::Plane {
            normal: vec![0.0; self.dimension],
            offset: 0.0,
        };
        (split, shuffled, right)
    }

    /// Hyperplane between two centroids found by a short two-means run.
    fn plane_split(&mut self, positions: &[u32]) -> Split {
        let (p, q) = self.two_means(positions);
        let mut normal: Vec<f32> = p.iter().zip(q.iter()).map(|(a, b)| a - b).collect();
        normalize(&mut normal);
        let offset = match self.metric {
            Metric::Angular => 0.0,
            _ => {
                -normal
                    .iter()
                    .zip(p.iter().zip(q.iter()))
                    .map(|(n, (a, b))| n * (a + b) / 2.0)
                    .sum::<f32>()
            }
        };
        Split::Plane { normal, offset }
    }

    fn two_means(&mut self, positions: &[u32]) -> (Vec<f32>, Vec<f32>) {
        let count = positions.len();
        let i = self.rng.gen_range(0..count);
        let mut j = self.rng.gen_range(0..count - 1);
        if j >= i {
            j += 1;
        }

        let angular = self.metric == Metric::Angular;
        let mut p = self.vector(positions[i]).to_vec();
        let mut q = self.vector(positions[j]).to_vec();
        if angular {
            normalize(&mut p);
            normalize(&mut q);
        }

        let (mut ic, mut jc) = (1.0f32, 1.0f32);
        for _ in 0..self.params.two_means_iterations {
            let k = self.rng.gen_range(0..count);
            let mut v = self.vector(positions[k]).to_vec();
            if angular {
                if crate::vector::norm(&v) <= 0.0 {
                    continue;
                }
                normalize(&mut v);
            }
            let di = ic * self.metric.distance(&p, &v);
            let dj = jc * self.metric.distance(&q, &v);
            if di < dj {
                update_centroid(&mut p, &v, ic);
                ic += 1.0;
            } else if dj < di {
                update_centroid(&mut q, &v, jc);
                jc += 1.0;
            }
        }
        (p, q)
    }

    /// A random bit that separates the items, falling back to a scan.
    fn bit_split(&mut self, positions: &[u32]) -> Option<Split> {
        let items = self.items;
        let differs = |dim: usize| {
            let ones = positions
                .iter()
                .filter(|&&p| metric::is_set(stored(items, p)[dim]))
                .count();
            ones > 0 && ones < positions.len()
        };

        for _ in 0..20 {
            let dim = self.rng.gen_range(0..self.dimension);
            if differs(dim) {
                return Some(Split::Bit { dim: dim as u32 });
            }
        }
        (0..self.dimension)
            .find(|&dim| differs(dim))
            .map(|dim| Split::Bit { dim: dim as u32 })
    }
}

fn stored(items: &[Option<Vec<f32>>], position: u32) -> &[f32] {
    items[position as usize].as_deref().unwrap_or_default()
}

fn update_centroid(centroid: &mut [f32], v: &[f32], weight: f32) {
    for (c, x) in centroid.iter_mut().zip(v.iter()) {
        *c = (*c * weight + x) / (weight + 1.0);
    }
}

fn is_imbalanced(left: usize, right: usize) -> bool {
    let total = (left + right) as f32;
    left == 0 || right == 0 || left.max(right) as f32 / total > 0.95
}
