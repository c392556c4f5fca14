//! Closed option sets for the matcher.
//!
//! Each option parses from its kebab-case name or from the legacy mode
//! identifiers (`MAT_BF`, `SEL_KNN`, ...) used by older drivers. Unknown
//! strings are rejected instead of falling back to a default.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Descriptor family, which also fixes the distance function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetricFamily {
    /// Bit-packed descriptors compared with the Hamming distance (BRISK, ORB, BRIEF).
    #[cfg_attr(feature = "serde", serde(rename = "binary", alias = "DES_BINARY"))]
    Binary,
    /// Floating point descriptors compared with the L2 distance (SIFT, SURF).
    #[cfg_attr(feature = "serde", serde(rename = "continuous", alias = "DES_HOG", alias = "NORM_L2"))]
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MatcherKind {
    /// Exact distances to every reference descriptor.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "brute-force", alias = "MAT_BF"))]
    BruteForce,
    /// Randomized kd-tree forest built over the reference set for each call.
    #[cfg_attr(feature = "serde", serde(rename = "approximate", alias = "MAT_FLANN"))]
    ApproximateIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SelectionStrategy {
    /// Keep the single nearest reference descriptor.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "nearest", alias = "SEL_NN"))]
    SingleNearest,
    /// Take the two nearest and keep the best only if it passes the distance ratio test.
    #[cfg_attr(feature = "serde", serde(rename = "knn-ratio", alias = "SEL_KNN"))]
    KNearestRatio,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 2] = [MetricFamily::Binary, MetricFamily::Continuous];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricFamily::Binary => "binary",
            MetricFamily::Continuous => "continuous",
        }
    }
}

impl MatcherKind {
    pub const ALL: [MatcherKind; 2] = [MatcherKind::BruteForce, MatcherKind::ApproximateIndex];

    pub fn as_str(self) -> &'static str {
        match self {
            MatcherKind::BruteForce => "brute-force",
            MatcherKind::ApproximateIndex => "approximate",
        }
    }
}

impl SelectionStrategy {
    pub const ALL: [SelectionStrategy; 2] =
        [SelectionStrategy::SingleNearest, SelectionStrategy::KNearestRatio];

    pub fn as_str(self) -> &'static str {
        match self {
            SelectionStrategy::SingleNearest => "nearest",
            SelectionStrategy::KNearestRatio => "knn-ratio",
        }
    }
}

impl FromStr for MetricFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" | "hamming" | "DES_BINARY" => Ok(MetricFamily::Binary),
            "continuous" | "l2" | "DES_HOG" | "NORM_L2" => Ok(MetricFamily::Continuous),
            other => Err(unknown("metric family", other)),
        }
    }
}

impl FromStr for MatcherKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brute-force" | "bf" | "MAT_BF" => Ok(MatcherKind::BruteForce),
            "approximate" | "flann" | "MAT_FLANN" => Ok(MatcherKind::ApproximateIndex),
            other => Err(unknown("matcher kind", other)),
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" | "nn" | "SEL_NN" => Ok(SelectionStrategy::SingleNearest),
            "knn-ratio" | "knn" | "SEL_KNN" => Ok(SelectionStrategy::KNearestRatio),
            other => Err(unknown("selection strategy", other)),
        }
    }
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown(kind: &'static str, value: &str) -> CoreError {
    CoreError::UnknownOption { kind, value: value.to_string() }
}
