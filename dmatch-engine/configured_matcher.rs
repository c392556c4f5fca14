use dmatch_core::{DescriptorSet, MatchSet, MetricFamily};
use crate::config::MatcherConfig;
use crate::error::MatchResult;
use crate::matcher;
use crate::types::MatchReport;

/// A matcher whose configuration has already been validated.
///
/// Holds no descriptor state; every call builds whatever search structure it
/// needs and drops it before returning, so one instance can serve many pairs
/// of descriptor sets, from any number of threads.
#[derive(Debug, Clone)]
pub struct ConfiguredMatcher {
    pub(crate) config: MatcherConfig,
}

impl ConfiguredMatcher {
    /// Match `source` against `reference`.
    ///
    /// # Arguments
    /// * `source` - Query descriptors; result indices refer to its rows.
    /// * `reference` - Descriptors searched for each source row.
    ///
    /// # Returns
    /// A `MatchResult` containing at most one match per source descriptor,
    /// ascending by source index.
    pub fn match_descriptors(&self, source: &DescriptorSet, reference: &DescriptorSet) -> MatchResult<MatchSet> {
        matcher::match_descriptors(source, reference, &self.config)
    }

    /// Match and also report k, the number of queried descriptors and the elapsed time.
    pub fn match_with_report(&self, source: &DescriptorSet, reference: &DescriptorSet) -> MatchResult<MatchReport> {
        matcher::match_with_report(source, reference, &self.config)
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn metric(&self) -> MetricFamily {
        self.config.metric
    }

    /// Get a summary of the matcher's configuration.
    pub fn config_summary(&self) -> String {
        self.config.summary()
    }
}
