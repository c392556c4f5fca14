#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metric-dependent, non-negative descriptor distance.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Distance {
    /// Number of differing bits
    Hamming(u32),
    /// Euclidean (L2) norm of the difference
    Euclidean(f32),
}

impl Distance {
    pub fn value(self) -> f32 {
        match self {
            Distance::Hamming(d) => d as f32,
            Distance::Euclidean(d) => d,
        }
    }
}

/// Correspondence between source row `source_idx` and reference row `reference_idx`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub source_idx: usize,
    pub reference_idx: usize,
    pub distance: Distance,
}

/// Matches in ascending source index order, at most one per source row.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MatchSet(Vec<Match>);

impl MatchSet {
    pub fn new(matches: Vec<Match>) -> Self {
        debug_assert!(
            matches.windows(2).all(|w| w[0].source_idx < w[1].source_idx),
            "match sets are ordered by strictly ascending source index"
        );
        Self(matches)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Match] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Match> {
        self.0
    }

    /// Match for a given source row, if it survived selection.
    pub fn for_source(&self, source_idx: usize) -> Option<&Match> {
        self.0
            .binary_search_by_key(&source_idx, |m| m.source_idx)
            .ok()
            .map(|pos| &self.0[pos])
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for MatchSet {
    type Item = Match;
    type IntoIter = std::vec::IntoIter<Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
