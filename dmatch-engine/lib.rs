//! Descriptor matching engine.
//!
//! Pairs each source descriptor with its best reference descriptor using
//! exhaustive search or a randomized kd-tree forest, then filters the raw
//! candidates with a single-nearest, cross-checked, or distance ratio policy.

mod brute_force;
mod builder;
mod config;
mod configured_matcher;
mod distance;
mod error;
mod kdtree;
mod matcher;
mod types;

pub use brute_force::{BruteForce, CandidateSearch};
pub use builder::MatcherBuilder;
pub use config::{IndexParams, MatcherConfig, DEFAULT_RATIO};
pub use configured_matcher::ConfiguredMatcher;
pub use distance::{hamming_distance, l2_distance, Euclidean, Hamming, Metric};
pub use error::{ConfigError, MatchError, MatchResult};
pub use kdtree::{ForestParams, KdForest};
pub use matcher::{match_descriptors, match_with_report, validate_inputs};
pub use types::{MatchReport, Neighbor};

pub use dmatch_core::{
    CoreError, DescriptorData, DescriptorSet, Distance, Keypoint, Match, MatchSet, MatcherKind, MetricFamily,
    SelectionStrategy,
};
