//! Randomized kd-tree forest for approximate nearest-neighbour search.
//!
//! Each tree splits on the mean of a dimension drawn at random from the few
//! highest-variance dimensions of its node. Queries descend every tree, then
//! keep exploring the closest pending branches across all trees until the
//! check budget is spent. Leaf points are examined at most once per query.

use crate::brute_force::CandidateSearch;
use crate::distance::{l2_distance, Euclidean};
use crate::types::{KnnBuffer, Neighbor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Points sampled from a node to estimate per-dimension mean and variance
const SAMPLE_MEAN: usize = 100;
/// Split dimension is drawn from this many highest-variance candidates
const RAND_DIM: usize = 5;
const LEAF_MAX_SIZE: usize = 1;

/// Search parameters of the approximate index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub trees: usize,
    pub checks: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf { start: usize, end: usize },
    Split { dim: usize, value: f32, left: usize, right: usize },
}

#[derive(Debug)]
struct KdTree {
    nodes: Vec<Node>,
    /// Row indices permuted so every leaf owns a contiguous range
    indices: Vec<usize>,
}

/// Pending branch in the shared best-bin-first queue
#[derive(Debug, Clone, Copy)]
struct Branch {
    bound: f32,
    seq: usize,
    tree: usize,
    node: usize,
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Branch {}

impl PartialOrd for Branch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Branch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bound
            .total_cmp(&other.bound)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Per-query mutable state shared by all trees
struct SearchState {
    results: KnnBuffer<f32>,
    /// Rows already examined; sized by the work done, not by the index
    visited: HashSet<usize>,
    checks: usize,
    heap: BinaryHeap<Reverse<Branch>>,
    seq: usize,
}

impl SearchState {
    fn exhausted(&self, max_checks: usize) -> bool {
        self.checks >= max_checks && self.results.is_full()
    }

    /// A region at distance `bound` cannot hold a better neighbour.
    fn prunes(&self, bound: f32) -> bool {
        self.results.worst().is_some_and(|worst| bound > worst)
    }
}

/// Forest of randomized kd-trees over a borrowed row-major float set.
#[derive(Debug)]
pub struct KdForest<'a> {
    data: &'a [f32],
    row_len: usize,
    trees: Vec<KdTree>,
    checks: usize,
}

impl<'a> KdForest<'a> {
    pub fn build(data: &'a [f32], row_len: usize, params: ForestParams) -> Self {
        debug_assert!(row_len > 0 && data.len() % row_len == 0);
        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = data.len() / row_len;
        let trees = (0..params.trees.max(1))
            .map(|_| KdTree::build(data, row_len, n, &mut rng))
            .collect();
        Self { data, row_len, trees, checks: params.checks.max(1) }
    }

    fn search(&self, query: &[f32], k: usize) -> SearchState {
        let mut state = SearchState {
            results: KnnBuffer::new(k),
            visited: HashSet::with_capacity(self.checks.saturating_add(k).min(self.len())),
            checks: 0,
            heap: BinaryHeap::new(),
            seq: 0,
        };

        for tree_idx in 0..self.trees.len() {
            self.descend(tree_idx, 0, 0.0, query, &mut state);
        }

        // Keep going past the check budget until k neighbours are known
        while let Some(Reverse(branch)) = state.heap.pop() {
            if state.exhausted(self.checks) || state.prunes(branch.bound) {
                break;
            }
            self.descend(branch.tree, branch.node, branch.bound, query, &mut state);
        }
        state
    }

    fn row(&self, idx: usize) -> &[f32] {
        &self.data[idx * self.row_len..(idx + 1) * self.row_len]
    }

    fn descend(&self, tree_idx: usize, mut node_idx: usize, bound: f32, query: &[f32], state: &mut SearchState) {
        if state.exhausted(self.checks) || state.prunes(bound) {
            return;
        }
        let tree = &self.trees[tree_idx];
        loop {
            match tree.nodes[node_idx] {
                Node::Leaf { start, end } => {
                    for &idx in &tree.indices[start..end] {
                        if !state.visited.insert(idx) {
                            continue;
                        }
                        state.checks += 1;
                        state.results.push(Neighbor {
                            index: idx,
                            distance: l2_distance(query, self.row(idx)),
                        });
                    }
                    return;
                }
                Node::Split { dim, value, left, right } => {
                    let diff = query[dim] - value;
                    let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                    let far_bound = bound.max(diff.abs());
                    if !state.prunes(far_bound) {
                        state.heap.push(Reverse(Branch {
                            bound: far_bound,
                            seq: state.seq,
                            tree: tree_idx,
                            node: far,
                        }));
                        state.seq += 1;
                    }
                    node_idx = near;
                }
            }
        }
    }
}

impl<'a> CandidateSearch<f32> for KdForest<'a> {
    type Kernel = Euclidean;

    fn knn(&self, query: &[f32], k: usize) -> Vec<Neighbor<f32>> {
        self.search(query, k).results.into_vec()
    }

    fn len(&self) -> usize {
        self.data.len() / self.row_len
    }
}

impl KdTree {
    fn build(data: &[f32], row_len: usize, n: usize, rng: &mut StdRng) -> Self {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut nodes = vec![Node::Leaf { start: 0, end: n }];
        let mut pending = vec![(0usize, 0usize, n)];

        while let Some((slot, start, end)) = pending.pop() {
            if end - start <= LEAF_MAX_SIZE {
                nodes[slot] = Node::Leaf { start, end };
                continue;
            }
            let Some((dim, value)) = choose_split(data, row_len, &indices[start..end], rng) else {
                // All sampled points coincide
                nodes[slot] = Node::Leaf { start, end };
                continue;
            };
            let mid = start + partition(&mut indices[start..end], |idx| data[idx * row_len + dim] < value);
            if mid == start || mid == end {
                nodes[slot] = Node::Leaf { start, end };
                continue;
            }

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { start, end: mid });
            nodes.push(Node::Leaf { start: mid, end });
            nodes[slot] = Node::Split { dim, value, left, right };
            pending.push((right, mid, end));
            pending.push((left, start, mid));
        }

        Self { nodes, indices }
    }
}

/// Pick a split dimension among the highest-variance ones and split at its mean.
fn choose_split(data: &[f32], row_len: usize, node: &[usize], rng: &mut StdRng) -> Option<(usize, f32)> {
    let sample = &node[..node.len().min(SAMPLE_MEAN)];
    let count = sample.len() as f32;

    let mut mean = vec![0.0f32; row_len];
    for &idx in sample {
        for (m, v) in mean.iter_mut().zip(&data[idx * row_len..(idx + 1) * row_len]) {
            *m += v;
        }
    }
    mean.iter_mut().for_each(|m| *m /= count);

    let mut var = vec![0.0f32; row_len];
    for &idx in sample {
        for ((s, m), v) in var.iter_mut().zip(&mean).zip(&data[idx * row_len..(idx + 1) * row_len]) {
            let d = v - m;
            *s += d * d;
        }
    }

    let mut ranked: Vec<(usize, f32)> = var.into_iter().enumerate().filter(|&(_, v)| v > 0.0).collect();
    if ranked.is_empty() {
        return None;
    }
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(RAND_DIM);

    let dim = ranked[rng.gen_range(0..ranked.len())].0;
    Some((dim, mean[dim]))
}

/// In-place partition; returns how many leading entries satisfy `pred`.
fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut split = 0;
    for i in 0..indices.len() {
        if pred(indices[i]) {
            indices.swap(split, i);
            split += 1;
        }
    }
    split
}
