mod descriptor;
mod error;
mod matches;
mod options;

pub use descriptor::{DescriptorData, DescriptorSet};
pub use error::{CoreError, CoreResult};
pub use matches::{Distance, Match, MatchSet};
pub use options::{MatcherKind, MetricFamily, SelectionStrategy};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key-point ≙ image location with optional scale and orientation (radians).
///
/// Only carried alongside descriptors for downstream consumers; matching never reads it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub size: Option<f32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub angle: Option<f32>,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, size: None, angle: None }
    }
}

/// Number of worker threads to use when none is configured
pub fn default_threads() -> usize {
    num_cpus::get().max(1)
}

/// Build a call-scoped Rayon pool; the global pool is never touched.
pub fn build_thread_pool(n_threads: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()
}
