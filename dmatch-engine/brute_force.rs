use crate::distance::Metric;
use crate::types::{KnnBuffer, Neighbor};
use std::marker::PhantomData;

/// Nearest-neighbour queries against a fixed set of rows.
pub trait CandidateSearch<T>: Sync {
    type Kernel: Metric<Elem = T>;

    /// Up to `k` nearest rows to `query`, ascending by distance then index.
    fn knn(&self, query: &[T], k: usize) -> Vec<Neighbor<<Self::Kernel as Metric>::Dist>>;

    /// Number of indexed rows
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exhaustive search: every row is compared against the query.
pub struct BruteForce<'a, M: Metric> {
    data: &'a [M::Elem],
    row_len: usize,
    _metric: PhantomData<M>,
}

impl<'a, M: Metric> BruteForce<'a, M> {
    pub fn new(data: &'a [M::Elem], row_len: usize) -> Self {
        debug_assert!(row_len > 0 && data.len() % row_len == 0);
        Self { data, row_len, _metric: PhantomData }
    }
}

impl<'a, M: Metric> CandidateSearch<M::Elem> for BruteForce<'a, M> {
    type Kernel = M;

    fn knn(&self, query: &[M::Elem], k: usize) -> Vec<Neighbor<M::Dist>> {
        let mut best = KnnBuffer::new(k);
        for (index, row) in self.data.chunks_exact(self.row_len).enumerate() {
            best.push(Neighbor { index, distance: M::distance(query, row) });
        }
        best.into_vec()
    }

    fn len(&self) -> usize {
        self.data.len() / self.row_len
    }
}
