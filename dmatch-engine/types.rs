use dmatch_core::MatchSet;
use std::cmp::Ordering;
use std::time::Duration;

/// Candidate reference row with its distance to a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<D> {
    pub index: usize,
    pub distance: D,
}

impl<D: PartialOrd> Neighbor<D> {
    /// Ascending distance, ties broken by the lower index.
    pub(crate) fn cmp_rank(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then(self.index.cmp(&other.index))
    }
}

/// Bounded, sorted buffer of the `k` best neighbours seen so far.
#[derive(Debug, Clone)]
pub(crate) struct KnnBuffer<D> {
    k: usize,
    items: Vec<Neighbor<D>>,
}

impl<D: Copy + PartialOrd> KnnBuffer<D> {
    pub(crate) fn new(k: usize) -> Self {
        Self { k, items: Vec::with_capacity(k + 1) }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.items.len() >= self.k
    }

    /// Distance of the current k-th neighbour, once the buffer is full.
    pub(crate) fn worst(&self) -> Option<D> {
        if self.is_full() {
            self.items.last().map(|n| n.distance)
        } else {
            None
        }
    }

    pub(crate) fn push(&mut self, candidate: Neighbor<D>) {
        if self.k == 0 {
            return;
        }
        if let Some(last) = self.items.last() {
            if self.is_full() && candidate.cmp_rank(last) != Ordering::Less {
                return;
            }
        }
        let pos = self
            .items
            .partition_point(|n| n.cmp_rank(&candidate) == Ordering::Less);
        self.items.insert(pos, candidate);
        self.items.truncate(self.k);
    }

    pub(crate) fn into_vec(self) -> Vec<Neighbor<D>> {
        self.items
    }
}

/// Result of one matching call plus the diagnostics the driver reports.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub matches: MatchSet,
    /// Candidates requested per source descriptor (1 or 2)
    pub k: usize,
    /// Source descriptors queried, i.e. raw candidate lists before filtering
    pub queried: usize,
    pub elapsed: Duration,
}

impl MatchReport {
    /// `1 - |matches| / queried`; reporting only.
    pub fn discarded_fraction(&self) -> f32 {
        if self.queried == 0 {
            return 0.0;
        }
        1.0 - self.matches.len() as f32 / self.queried as f32
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
