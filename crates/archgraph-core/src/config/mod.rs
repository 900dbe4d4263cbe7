//! Configuration for archgraph.
//!
//! # Architecture
//!
//! ```text
//! TOML text
//!   ↓ serde (DTO layer, unknown keys rejected)
//! dto::ConfigDto
//!   ↓ loader::load (validate + compile globs + layer table)
//! Config
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cache::Fingerprint;
use crate::types::{Category, Severity};

pub mod dto;
pub mod loader;
pub mod model;

pub use model::{CategoryPolicy, GlobPattern, Granularity, Layer, LayerTable, ModelError};

/// File extensions understood by the bundled module parser.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

const DEFAULT_INCLUDE: &[&str] = &[
    "**/*.ts", "**/*.tsx", "**/*.mts", "**/*.cts", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.cjs",
];

const DEFAULT_EXCLUDE: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/coverage/**",
];

/// Default cache directory, relative to the workspace root.
pub const DEFAULT_CACHE_DIR: &str = ".archgraph-cache";

/// Scanning and run-level settings (`[analyzer]`).
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// Workspace root, relative to the config file's directory.
    pub root: PathBuf,
    /// File include globs.
    pub include: Vec<GlobPattern>,
    /// File exclude globs; exclusion wins over inclusion.
    pub exclude: Vec<GlobPattern>,
    /// Package-root patterns; `"."` is the workspace root itself.
    pub packages: Vec<GlobPattern>,
    /// Whether `.gitignore` files are honored while walking.
    pub respect_gitignore: bool,
    /// Worker pool size.
    pub concurrency: usize,
    /// Diagnostics below this severity are dropped.
    pub min_severity: Severity,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            include: loader::default_globs(DEFAULT_INCLUDE),
            exclude: loader::default_globs(DEFAULT_EXCLUDE),
            packages: loader::default_globs(&["."]),
            respect_gitignore: true,
            concurrency: std::thread::available_parallelism()
                .map_or(1, std::num::NonZeroUsize::get),
            min_severity: Severity::Info,
        }
    }
}

/// Cache settings (`[cache]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Whether the cache is used.
    pub enabled: bool,
    /// Cache directory, relative to the workspace root unless absolute.
    pub dir: PathBuf,
    /// An unusable cache directory fails the run instead of being bypassed.
    pub strict: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
            strict: false,
        }
    }
}

/// Dependency usage policy (`[dependencies]`).
#[derive(Debug, Clone)]
pub struct DependencyPolicy {
    /// Whether type-only imports count as usage.
    pub count_type_only: bool,
    /// Severity of unused-dependency diagnostics.
    pub unused_severity: Severity,
    /// Default severity of missing-dependency diagnostics, floored at warning.
    pub missing_severity: Severity,
    /// Severity of unresolved-import diagnostics.
    pub unresolved_severity: Severity,
    /// Dependency names excluded from both checks.
    pub ignore: Vec<GlobPattern>,
}

impl Default for DependencyPolicy {
    fn default() -> Self {
        Self {
            count_type_only: true,
            unused_severity: Severity::Warning,
            missing_severity: Severity::Error,
            unresolved_severity: Severity::Warning,
            ignore: Vec::new(),
        }
    }
}

impl DependencyPolicy {
    /// Returns true if a dependency name is excluded from usage checks.
    #[must_use]
    pub fn is_ignored(&self, name: &str) -> bool {
        model::any_match(&self.ignore, name)
    }
}

/// Barrel-file policy for the layer validator (`[architecture]`).
#[derive(Debug, Clone, Default)]
pub struct ArchitecturePolicy {
    /// Check re-export-only files like any other edge source.
    pub enforce_public_api: bool,
    /// Re-export-only files still exempt when `enforce_public_api` is on.
    pub allow_barrel_exports: Vec<GlobPattern>,
}

impl ArchitecturePolicy {
    /// Returns true if edges leaving this module skip layer checks.
    #[must_use]
    pub fn exempts(&self, path: &str, reexport_only: bool) -> bool {
        if !reexport_only {
            return false;
        }
        !self.enforce_public_api || model::any_match(&self.allow_barrel_exports, path)
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `[analyzer]` settings.
    pub analyzer: AnalyzerSettings,
    /// `[cache]` settings.
    pub cache: CacheSettings,
    /// Per-category policies; absent categories use [`CategoryPolicy::default`].
    pub categories: BTreeMap<Category, CategoryPolicy>,
    /// Cycle detection granularity.
    pub granularity: Granularity,
    /// Dependency usage policy.
    pub dependencies: DependencyPolicy,
    /// Barrel-file policy.
    pub architecture: ArchitecturePolicy,
    /// Declared layers.
    pub layers: LayerTable,
    fingerprint: String,
    origin: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerSettings::default(),
            cache: CacheSettings::default(),
            categories: BTreeMap::new(),
            granularity: Granularity::default(),
            dependencies: DependencyPolicy::default(),
            architecture: ArchitecturePolicy::default(),
            layers: LayerTable::default(),
            fingerprint: fingerprint_of(&dto::ConfigDto::default()),
            origin: None,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let dto = parse_dto(&content)?;
        loader::load(dto, Some(path.to_path_buf()))
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        loader::load(parse_dto(content)?, None)
    }

    /// Policy for a category.
    #[must_use]
    pub fn category(&self, category: Category) -> CategoryPolicy {
        self.categories.get(&category).copied().unwrap_or_default()
    }

    /// Stable hash of every setting that can change analysis output.
    ///
    /// Concurrency and cache settings are excluded; neither changes results.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// File this configuration was loaded from, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }
}

fn parse_dto(content: &str) -> Result<dto::ConfigDto, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })
}

pub(crate) fn fingerprint_of(dto: &dto::ConfigDto) -> String {
    let mut canonical = dto.clone();
    canonical.analyzer.concurrency = None;
    canonical.cache = dto::CacheDto::default();
    let json = serde_json::to_string(&canonical).unwrap_or_default();
    Fingerprint::new("config").field(json.as_bytes()).finish().into_hex()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the config file.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// TOML syntax error or unknown key.
    #[error("failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },

    /// A field failed model validation.
    #[error("{context}: {source}")]
    Invalid {
        /// Where the error occurred (e.g., "layers[0].paths[1]").
        context: String,
        /// The underlying model error.
        source: ModelError,
    },

    /// A string field holds an unrecognized value.
    #[error("{context}: unknown value `{value}`, expected: {expected}")]
    UnknownValue {
        /// Where the error occurred.
        context: String,
        /// The invalid value.
        value: String,
        /// Accepted values.
        expected: &'static str,
    },

    /// `[categories.<name>]` names an unknown category.
    #[error(
        "unknown category `{name}`, expected: \
         dependency, configuration, architecture, circular-import"
    )]
    UnknownCategory {
        /// The unknown name.
        name: String,
    },

    /// `cache.dir` points at the workspace root.
    #[error("cache.dir `{dir}` resolves to the workspace root")]
    CacheDirIsRoot {
        /// The configured directory.
        dir: String,
    },

    /// `analyzer.concurrency` is zero.
    #[error("analyzer.concurrency must be at least 1")]
    ZeroConcurrency,

    /// Layer table cross-reference errors.
    #[error("layer validation errors:\n{}", format_errors(.0))]
    Layers(Vec<ModelError>),
}

fn format_errors(errors: &[ModelError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_empty_file() {
        let parsed = Config::parse("").unwrap();
        let default = Config::default();
        assert_eq!(parsed.fingerprint(), default.fingerprint());
        assert_eq!(parsed.analyzer.include.len(), SOURCE_EXTENSIONS.len());
        assert_eq!(default.analyzer.exclude.len(), 4);
    }

    #[test]
    fn fingerprint_ignores_concurrency_and_cache() {
        let a = Config::parse("[analyzer]\nconcurrency = 1\n").unwrap();
        let b = Config::parse("[analyzer]\nconcurrency = 8\n[cache]\nenabled = false\n").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_policy() {
        let a = Config::parse("").unwrap();
        let b = Config::parse("[dependencies]\ncount_type_only = false\n").unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(matches!(
            Config::parse("[analyzer\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn barrel_exemption_policy() {
        let mut policy = ArchitecturePolicy::default();
        assert!(policy.exempts("src/index.ts", true));
        assert!(!policy.exempts("src/a.ts", false));

        policy.enforce_public_api = true;
        assert!(!policy.exempts("src/index.ts", true));
        policy.allow_barrel_exports = vec![GlobPattern::new("**/index.ts").unwrap()];
        assert!(policy.exempts("src/index.ts", true));
    }

    #[test]
    fn from_file_records_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archgraph.toml");
        std::fs::write(&path, "[cycles]\ngranularity = \"package\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.granularity, Granularity::Package);
        assert_eq!(config.origin(), Some(path.as_path()));
    }
}
