//! Evaluator configuration.

use std::path::PathBuf;

use rill_runtime::FULL_COLLECTION;

/// Default nesting limit for expression and statement evaluation.
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// Default extension of script files found by lazy resolution.
pub const DEFAULT_SCRIPT_EXTENSION: &str = "rill";

/// Allocations between collections run by the top-level driver.
pub const DEFAULT_GC_THRESHOLD: usize = 10_000;

/// Settings shared by every interpreter built on one context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum nesting of evaluations before `RecursionLimit` is raised.
    pub max_depth: usize,
    /// Extension (without the dot) of script files.
    pub script_extension: String,
    /// Directory the root frame resolves unknown identifiers against.
    pub root_dir: Option<PathBuf>,
    /// Allocations between driver collections.
    pub gc_threshold: usize,
    /// Generation bound passed to driver collections.
    pub gc_generation: u8,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
            root_dir: None,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            gc_generation: FULL_COLLECTION,
        }
    }
}

impl EvalConfig {
    /// Defaults overridden by `RILL_MAX_DEPTH` and `RILL_PATH`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = EvalConfig::default();
        if let Some(raw) = var("RILL_MAX_DEPTH") {
            match raw.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_depth = depth,
                _ => tracing::warn!(value = %raw, "ignoring invalid RILL_MAX_DEPTH"),
            }
        }
        if let Some(path) = var("RILL_PATH").filter(|p| !p.is_empty()) {
            config.root_dir = Some(PathBuf::from(path));
        }
        config
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_script_extension(mut self, extension: impl Into<String>) -> Self {
        self.script_extension = extension.into();
        self
    }

    #[must_use]
    pub fn with_gc_threshold(mut self, threshold: usize) -> Self {
        self.gc_threshold = threshold;
        self
    }
}
