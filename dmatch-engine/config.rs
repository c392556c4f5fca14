use dmatch_core::{MatcherKind, MetricFamily, SelectionStrategy};
use crate::builder::MatcherBuilder;
use crate::error::{ConfigError, MatchError, MatchResult};
use crate::kdtree::ForestParams;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nearest-neighbour distance ratio threshold
pub const DEFAULT_RATIO: f32 = 0.8;

/// Randomized kd-tree forest settings for `MatcherKind::ApproximateIndex`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IndexParams {
    /// Number of randomized trees
    pub trees: usize,
    /// Leaf points examined per query before the search may stop
    pub checks: usize,
    /// Seed for split dimension selection
    pub seed: u64,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self { trees: 4, checks: 32, seed: 0x5eed }
    }
}

impl From<IndexParams> for ForestParams {
    fn from(p: IndexParams) -> Self {
        ForestParams { trees: p.trees, checks: p.checks, seed: p.seed }
    }
}

/// Complete matcher configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatcherConfig {
    /// Descriptor family; fixes Hamming vs. L2
    pub metric: MetricFamily,
    #[cfg_attr(feature = "serde", serde(default))]
    pub matcher: MatcherKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub selector: SelectionStrategy,
    /// Mutual nearest neighbour under `SingleNearest`; forces k = 1 under `KNearestRatio`
    #[cfg_attr(feature = "serde", serde(default))]
    pub cross_check: bool,
    #[cfg_attr(feature = "serde", serde(default = "default_ratio"))]
    pub ratio: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub index: IndexParams,
    /// Spread per-descriptor work over Rayon workers
    #[cfg_attr(feature = "serde", serde(default = "default_parallel"))]
    pub parallel: bool,
    /// Run inside a dedicated pool of this size instead of the global one
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub threads: Option<usize>,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub version: Option<String>,
}

#[cfg(feature = "serde")]
fn default_ratio() -> f32 {
    DEFAULT_RATIO
}

#[cfg(feature = "serde")]
fn default_parallel() -> bool {
    true
}

impl MatcherConfig {
    /// Brute-force single nearest neighbour, no cross-check
    pub fn new(metric: MetricFamily) -> Self {
        Self {
            metric,
            matcher: MatcherKind::BruteForce,
            selector: SelectionStrategy::SingleNearest,
            cross_check: false,
            ratio: DEFAULT_RATIO,
            index: IndexParams::default(),
            parallel: true,
            threads: None,
            name: None,
            description: None,
            version: None,
        }
    }

    /// Exact preset: brute force with mutual nearest neighbours
    pub fn exact_preset(metric: MetricFamily) -> Self {
        Self {
            cross_check: true,
            name: Some("Exact".to_string()),
            description: Some("Brute-force mutual nearest neighbours".to_string()),
            version: Some("1.0".to_string()),
            ..Self::new(metric)
        }
    }

    /// Ratio test preset: brute force k = 2 with the 0.8 distance ratio
    pub fn ratio_test_preset(metric: MetricFamily) -> Self {
        Self {
            selector: SelectionStrategy::KNearestRatio,
            name: Some("Ratio Test".to_string()),
            description: Some("Brute-force two nearest neighbours with distance ratio filtering".to_string()),
            version: Some("1.0".to_string()),
            ..Self::new(metric)
        }
    }

    /// Approximate preset: kd-forest k = 2 with ratio filtering, for large sets
    pub fn approximate_preset(metric: MetricFamily) -> Self {
        Self {
            matcher: MatcherKind::ApproximateIndex,
            selector: SelectionStrategy::KNearestRatio,
            name: Some("Approximate".to_string()),
            description: Some("Randomized kd-forest with distance ratio filtering".to_string()),
            version: Some("1.0".to_string()),
            ..Self::new(metric)
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self.version = Some("1.0".to_string());
        self
    }

    /// Convert to MatcherBuilder for further customization
    pub fn to_builder(self) -> MatcherBuilder {
        MatcherBuilder::from_config(self)
    }

    /// Candidates requested per source descriptor.
    ///
    /// Cross-checking and ratio filtering are alternative survivor policies,
    /// so a cross-checked k-nearest run degrades to a single candidate.
    pub fn effective_k(&self) -> usize {
        match self.selector {
            SelectionStrategy::SingleNearest => 1,
            SelectionStrategy::KNearestRatio if self.cross_check => 1,
            SelectionStrategy::KNearestRatio => 2,
        }
    }

    /// Workers a call will use: the dedicated pool size, the global pool
    /// size, or one when parallelism is off.
    pub fn worker_threads(&self) -> usize {
        match self.threads {
            Some(n) => n,
            None if self.parallel => dmatch_core::default_threads(),
            None => 1,
        }
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        let mut s = format!(
            "MatcherConfig: metric={}, matcher={}, selector={}, cross_check={}, k={}",
            self.metric, self.matcher, self.selector, self.cross_check, self.effective_k()
        );
        if self.effective_k() == 2 {
            s.push_str(&format!(", ratio={:.2}", self.ratio));
        }
        if self.matcher == MatcherKind::ApproximateIndex {
            s.push_str(&format!(", trees={}, checks={}", self.index.trees, self.index.checks));
        }
        match self.threads {
            Some(n) => s.push_str(&format!(", threads={}", n)),
            None => s.push_str(&format!(", parallel={}", self.parallel)),
        }
        s
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> MatchResult<()> {
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(ConfigError::InvalidRatio(self.ratio).into());
        }
        if self.index.trees == 0 {
            return Err(ConfigError::InvalidTrees.into());
        }
        if self.index.checks == 0 {
            return Err(ConfigError::InvalidChecks.into());
        }
        if self.threads == Some(0) {
            return Err(MatchError::Configuration(ConfigError::InvalidThreads));
        }
        Ok(())
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}
