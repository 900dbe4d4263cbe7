//! TOML deserialization types (DTO layer).
//!
//! These types exist solely for serde deserialization. Every section rejects
//! unknown keys. They are converted to the validated model by the loader.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw TOML representation of `archgraph.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDto {
    /// `[analyzer]` section.
    #[serde(default)]
    pub analyzer: AnalyzerDto,

    /// `[cache]` section.
    #[serde(default)]
    pub cache: CacheDto,

    /// `[categories.<name>]` tables.
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryDto>,

    /// `[cycles]` section.
    #[serde(default)]
    pub cycles: CyclesDto,

    /// `[dependencies]` section.
    #[serde(default)]
    pub dependencies: DependenciesDto,

    /// `[architecture]` section.
    #[serde(default)]
    pub architecture: ArchitectureDto,

    /// `[[layers]]` entries, in declaration order.
    #[serde(default)]
    pub layers: Vec<LayerDto>,
}

/// `[analyzer]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerDto {
    /// Workspace root, relative to the config file's directory.
    pub root: Option<String>,
    /// File include globs.
    pub include: Option<Vec<String>>,
    /// File exclude globs.
    pub exclude: Option<Vec<String>>,
    /// Package-root directory patterns.
    pub packages: Option<Vec<String>>,
    /// Whether `.gitignore` files are honored.
    pub respect_gitignore: Option<bool>,
    /// Worker pool size.
    pub concurrency: Option<usize>,
    /// Diagnostics below this severity are dropped.
    pub min_severity: Option<String>,
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheDto {
    /// Whether the cache is used at all.
    pub enabled: Option<bool>,
    /// Cache directory, relative to the workspace root.
    pub dir: Option<String>,
    /// Fail the run when the cache directory is unusable.
    pub strict: Option<bool>,
}

/// `[categories.<name>]` table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryDto {
    /// Whether diagnostics of this category are reported.
    pub enabled: Option<bool>,
    /// Severity applied to every diagnostic of this category.
    pub severity: Option<String>,
}

/// `[cycles]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CyclesDto {
    /// `"file"` or `"package"`.
    pub granularity: Option<String>,
}

/// `[dependencies]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DependenciesDto {
    /// Whether type-only imports count as usage.
    pub count_type_only: Option<bool>,
    /// Severity of unused-dependency diagnostics.
    pub unused_severity: Option<String>,
    /// Default severity of missing-dependency diagnostics (never below warning).
    pub missing_severity: Option<String>,
    /// Severity of unresolved-import diagnostics.
    pub unresolved_severity: Option<String>,
    /// Dependency-name globs excluded from usage checks.
    pub ignore: Option<Vec<String>>,
}

/// `[architecture]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArchitectureDto {
    /// Check re-export-only files like any other edge source.
    pub enforce_public_api: Option<bool>,
    /// Barrel files still exempt when `enforce_public_api` is on.
    pub allow_barrel_exports: Option<Vec<String>>,
}

/// `[[layers]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LayerDto {
    /// Layer name.
    pub name: String,
    /// Member path globs.
    pub paths: Vec<String>,
    /// Layers this layer may import from.
    #[serde(default)]
    pub allow: Vec<String>,
}
