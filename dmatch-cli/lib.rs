use dmatch_engine::{
    ConfiguredMatcher, MatchError, MatchReport, MatchResult, MatchSet, MatcherBuilder, MatcherConfig,
    MatcherKind, SelectionStrategy,
};
use dmatch_store::{FeatureDump, StoreError};
use log::{debug, info};
use std::path::Path;
use thiserror::Error;

pub use dmatch_core;
pub use dmatch_engine;
pub use dmatch_store;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Matching error: {0}")]
    Match(#[from] MatchError),
    #[error("Cannot load matcher configuration {path}: {reason}")]
    Config { path: String, reason: String },
    #[error("Cannot write matches: {0}")]
    Output(#[from] std::io::Error),
    #[error("Cannot encode matches: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// High-level matcher that works on feature dumps instead of raw descriptor sets
#[derive(Debug, Clone)]
pub struct MatchSession {
    matcher: ConfiguredMatcher,
}

impl MatchSession {
    /// Validate the configuration once; the session can then match any number of dump pairs
    pub fn new(config: MatcherConfig) -> SessionResult<Self> {
        Self::from_builder(config.to_builder())
    }

    pub fn from_builder(builder: MatcherBuilder) -> SessionResult<Self> {
        let matcher = builder.build()?;
        info!("{}", matcher.config_summary());
        Ok(Self { matcher })
    }

    /// Match the descriptors of two loaded dumps
    pub fn match_dumps(&self, source: &FeatureDump, reference: &FeatureDump) -> SessionResult<MatchReport> {
        Ok(self.matcher.match_with_report(&source.descriptors, &reference.descriptors)?)
    }

    /// Load both dumps from disk and match them
    pub fn match_files<P: AsRef<Path>, Q: AsRef<Path>>(&self, source: P, reference: Q) -> SessionResult<MatchReport> {
        let source = FeatureDump::load(source)?;
        let reference = FeatureDump::load(reference)?;
        self.match_dumps(&source, &reference)
    }

    pub fn config(&self) -> &MatcherConfig {
        self.matcher.config()
    }

    pub fn matcher(&self) -> &ConfiguredMatcher {
        &self.matcher
    }
}

/// Load a matcher configuration from a `.toml` or `.json` file
pub fn load_config<P: AsRef<Path>>(path: P) -> SessionResult<MatcherConfig> {
    let path = path.as_ref();
    let config_err = |reason: String| SessionError::Config { path: path.display().to_string(), reason };
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let loaded = match ext.to_ascii_lowercase().as_str() {
        "toml" => MatcherConfig::load_toml(path),
        "json" => MatcherConfig::load_json(path),
        _ => return Err(config_err("expected a .toml or .json file".to_string())),
    };
    loaded.map_err(|e| config_err(e.to_string()))
}

/// Write matches as pretty JSON
pub fn write_matches<P: AsRef<Path>>(path: P, matches: &MatchSet) -> SessionResult<()> {
    let json = serde_json::to_string_pretty(matches)?;
    std::fs::write(path.as_ref(), json)?;
    debug!("Wrote {} matches to {}", matches.len(), path.as_ref().display());
    Ok(())
}

/// One configuration of a [`run_suite`] sweep and its outcome
#[derive(Debug)]
pub struct SuiteRun {
    pub matcher: MatcherKind,
    pub selector: SelectionStrategy,
    pub cross_check: bool,
    pub outcome: MatchResult<MatchReport>,
}

impl SuiteRun {
    /// Short label such as `brute-force/knn-ratio/cross-check`
    pub fn label(&self) -> String {
        let check = if self.cross_check { "cross-check" } else { "no-check" };
        format!("{}/{}/{}", self.matcher, self.selector, check)
    }
}

/// Run every matcher × selector × cross-check combination on one dump pair.
///
/// `base` supplies everything the sweep does not vary (ratio, index
/// parameters, threads). Failed runs are reported, not propagated.
pub fn run_suite(source: &FeatureDump, reference: &FeatureDump, base: &MatcherConfig) -> Vec<SuiteRun> {
    let mut runs = Vec::with_capacity(8);
    for matcher in MatcherKind::ALL {
        for selector in SelectionStrategy::ALL {
            for cross_check in [false, true] {
                let config = MatcherConfig { matcher, selector, cross_check, ..base.clone() };
                let outcome = dmatch_engine::match_with_report(&source.descriptors, &reference.descriptors, &config);
                runs.push(SuiteRun { matcher, selector, cross_check, outcome });
            }
        }
    }
    runs
}
