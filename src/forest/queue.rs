//! Priority queue utilities for forest traversal: f32 ordering for BinaryHeap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A tree node waiting to be visited, keyed by how far the query sits on the
/// wrong side of the splits leading to it (larger is more promising).
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub priority: f32,
    pub node: u32,
}

impl Candidate {
    pub fn new(node: u32, priority: f32) -> Self {
        Self { priority, node }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Max-heap on priority; ties go to the lower node index so traversal order is
// reproducible.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Max-heap of tree nodes (highest priority on top).
#[derive(Debug, Default)]
pub struct NodeQueue {
    heap: BinaryHeap<Candidate>,
}

impl NodeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: u32, priority: f32) {
        self.heap.push(Candidate::new(node, priority));
    }

    pub fn pop(&mut self) -> Option<Candidate> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Keep the `n` closest `(position, distance)` pairs, nearest first.
/// Equal distances are ordered by position, except that `first` (the queried
/// item, if any) precedes everything at its own distance.
pub fn nearest(mut scored: Vec<(u32, f32)>, n: usize, first: Option<u32>) -> Vec<(u32, f32)> {
    let by_distance = |a: &(u32, f32), b: &(u32, f32)| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| (Some(b.0) == first).cmp(&(Some(a.0) == first)))
            .then_with(|| a.0.cmp(&b.0))
    };
    if n < scored.len() {
        if n == 0 {
            return Vec::new();
        }
        scored.select_nth_unstable_by(n - 1, by_distance);
        scored.truncate(n);
    }
    scored.sort_unstable_by(by_distance);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_ordering() {
        let mut queue = NodeQueue::new();
        queue.push(0, 1.0);
        queue.push(1, f32::INFINITY);
        queue.push(2, -3.0);

        assert_eq!(queue.pop().unwrap().node, 1);
        assert_eq!(queue.pop().unwrap().node, 0);
        assert_eq!(queue.pop().unwrap().node, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_ties_prefer_lower_node() {
        let mut queue = NodeQueue::new();
        queue.push(7, 0.0);
        queue.push(3, 0.0);
        queue.push(5, 0.0);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().node, 3);
        assert_eq!(queue.pop().unwrap().node, 5);
        assert_eq!(queue.pop().unwrap().node, 7);
    }

    #[test]
    fn test_nearest_truncates_and_sorts() {
        let scored = vec![(0, 5.0), (1, 1.0), (2, 3.0), (3, 2.0)];
        let top = nearest(scored, 2, None);
        assert_eq!(top, vec![(1, 1.0), (3, 2.0)]);
    }

    #[test]
    fn test_nearest_ties_by_position() {
        let scored = vec![(4, 0.0), (2, 0.0), (9, 1.0)];
        let top = nearest(scored, 10, None);
        assert_eq!(top, vec![(2, 0.0), (4, 0.0), (9, 1.0)]);
    }

    #[test]
    fn test_nearest_first_wins_ties() {
        let scored = vec![(1, 0.0), (6, 0.0), (3, 0.0), (0, 2.0)];
        assert_eq!(nearest(scored.clone(), 2, Some(6)), vec![(6, 0.0), (1, 0.0)]);
        // Only ties are reordered.
        assert_eq!(nearest(scored, 4, Some(0))[3], (0, 2.0));
    }

    #[test]
    fn test_nearest_zero() {
        assert!(nearest(vec![(0, 1.0)], 0, None).is_empty());
    }
}
