use dmatch_core::{MatcherKind, MetricFamily, SelectionStrategy};
use crate::config::MatcherConfig;
use crate::configured_matcher::ConfiguredMatcher;
use crate::error::MatchResult;

/// Builder for creating a `ConfiguredMatcher`
#[derive(Debug, Clone)]
pub struct MatcherBuilder {
    config: MatcherConfig,
}

impl MatcherBuilder {
    /// Create a new builder with default settings for the given descriptor family
    pub fn new(metric: MetricFamily) -> Self {
        Self { config: MatcherConfig::new(metric) }
    }

    /// Set the matcher kind (brute force or approximate index)
    pub fn matcher(mut self, kind: MatcherKind) -> Self {
        self.config.matcher = kind;
        self
    }

    /// Set the selection strategy
    pub fn selector(mut self, strategy: SelectionStrategy) -> Self {
        self.config.selector = strategy;
        self
    }

    /// Enable or disable cross-checking
    pub fn cross_check(mut self, enable: bool) -> Self {
        self.config.cross_check = enable;
        self
    }

    /// Set the distance ratio threshold used with k = 2
    pub fn ratio(mut self, ratio: f32) -> Self {
        self.config.ratio = ratio;
        self
    }

    /// Set the number of randomized kd-trees
    pub fn trees(mut self, trees: usize) -> Self {
        self.config.index.trees = trees;
        self
    }

    /// Set the per-query check budget of the approximate index
    pub fn checks(mut self, checks: usize) -> Self {
        self.config.index.checks = checks;
        self
    }

    /// Set the approximate index seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.index.seed = seed;
        self
    }

    /// Enable or disable parallel per-descriptor work
    pub fn parallel(mut self, enable: bool) -> Self {
        self.config.parallel = enable;
        self
    }

    /// Run in a dedicated pool with this many threads
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.threads = Some(n_threads);
        self
    }

    /// Apply the exact preset
    pub fn preset_exact(self) -> Self {
        self.apply_preset(MatcherConfig::exact_preset)
    }

    /// Apply the ratio test preset
    pub fn preset_ratio_test(self) -> Self {
        self.apply_preset(MatcherConfig::ratio_test_preset)
    }

    /// Apply the approximate preset
    pub fn preset_approximate(self) -> Self {
        self.apply_preset(MatcherConfig::approximate_preset)
    }

    fn apply_preset(mut self, preset: fn(MetricFamily) -> MatcherConfig) -> Self {
        let preset = preset(self.config.metric);
        self.config.matcher = preset.matcher;
        self.config.selector = preset.selector;
        self.config.cross_check = preset.cross_check;
        self.config.ratio = preset.ratio;
        self.config.index = preset.index;
        self.config.threads = preset.threads;
        self
    }

    /// Validate and build the `ConfiguredMatcher`
    pub fn build(self) -> MatchResult<ConfiguredMatcher> {
        self.config.validate()?;
        Ok(ConfiguredMatcher { config: self.config })
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.config.summary()
    }

    /// Create a builder from an existing `MatcherConfig`
    pub fn from_config(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Convert the builder into a `MatcherConfig`
    pub fn to_config(self) -> MatcherConfig {
        self.config
    }

    pub fn metric(&self) -> MetricFamily {
        self.config.metric
    }
}
