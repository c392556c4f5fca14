use dmatch_core::{CoreError, MetricFamily};
use thiserror::Error;

/// Invalid or mutually inconsistent matcher options and inputs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("source descriptors are {source_family}, reference descriptors are {reference}")]
    FamilyMismatch { source_family: MetricFamily, reference: MetricFamily },
    #[error("configured metric is {configured}, descriptors are {actual}")]
    MetricMismatch { configured: MetricFamily, actual: MetricFamily },
    #[error("source rows have length {source_len}, reference rows have length {reference}")]
    RowLengthMismatch { source_len: usize, reference: usize },
    #[error("ratio threshold {0} outside (0, 1]")]
    InvalidRatio(f32),
    #[error("approximate index needs at least one tree")]
    InvalidTrees,
    #[error("approximate index needs a check budget of at least one")]
    InvalidChecks,
    #[error("thread count must be at least one")]
    InvalidThreads,
    #[error(transparent)]
    Option(#[from] CoreError),
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("Empty input: the {0} descriptor set has no rows")]
    EmptyInput(&'static str),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<CoreError> for MatchError {
    fn from(err: CoreError) -> Self {
        MatchError::Configuration(ConfigError::Option(err))
    }
}

pub type MatchResult<T> = Result<T, MatchError>;
