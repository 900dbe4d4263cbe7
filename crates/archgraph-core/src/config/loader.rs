//! DTO → validated [`Config`] conversion.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::{Category, Severity};
use crate::utils::paths;

use super::dto::{ConfigDto, LayerDto};
use super::model::{CategoryPolicy, GlobPattern, Granularity, Layer, LayerTable, ModelError};
use super::{
    fingerprint_of, AnalyzerSettings, ArchitecturePolicy, CacheSettings, Config, ConfigError,
    DependencyPolicy,
};

/// Converts a `ConfigDto` into a validated `Config`.
///
/// `origin` is the file the DTO was read from, if any.
///
/// # Errors
///
/// Returns the first validation error encountered, or all layer
/// cross-reference errors at once.
pub fn load(dto: ConfigDto, origin: Option<PathBuf>) -> Result<Config, ConfigError> {
    let fingerprint = fingerprint_of(&dto);

    let mut analyzer = AnalyzerSettings::default();
    let a = dto.analyzer;
    if let Some(root) = a.root {
        analyzer.root = PathBuf::from(root);
    }
    if let Some(include) = a.include {
        analyzer.include = compile_globs(&include, "analyzer.include")?;
    }
    if let Some(exclude) = a.exclude {
        analyzer.exclude = compile_globs(&exclude, "analyzer.exclude")?;
    }
    if let Some(packages) = a.packages {
        let normalized: Vec<String> = packages.iter().map(|p| normalize_package(p)).collect();
        analyzer.packages = compile_globs(&normalized, "analyzer.packages")?;
    }
    if let Some(flag) = a.respect_gitignore {
        analyzer.respect_gitignore = flag;
    }
    if let Some(concurrency) = a.concurrency {
        if concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        analyzer.concurrency = concurrency;
    }
    if let Some(min) = a.min_severity {
        analyzer.min_severity = parse_severity(&min, "analyzer.min_severity")?;
    }

    let mut cache = CacheSettings::default();
    if let Some(enabled) = dto.cache.enabled {
        cache.enabled = enabled;
    }
    if let Some(dir) = dto.cache.dir {
        let relative = !Path::new(&dir).is_absolute();
        if relative && paths::normalize("", &dir.replace('\\', "/")).as_deref() == Some("") {
            return Err(ConfigError::CacheDirIsRoot { dir });
        }
        cache.dir = PathBuf::from(dir);
    }
    if let Some(strict) = dto.cache.strict {
        cache.strict = strict;
    }

    let mut categories = BTreeMap::new();
    for (name, c) in dto.categories {
        let category =
            Category::from_name(&name).ok_or_else(|| ConfigError::UnknownCategory {
                name: name.clone(),
            })?;
        let severity = c
            .severity
            .map(|s| parse_severity(&s, &format!("categories.{name}.severity")))
            .transpose()?;
        categories.insert(
            category,
            CategoryPolicy {
                enabled: c.enabled.unwrap_or(true),
                severity,
            },
        );
    }

    let granularity = match dto.cycles.granularity {
        Some(g) => Granularity::from_name(&g).ok_or_else(|| ConfigError::UnknownValue {
            context: "cycles.granularity".to_string(),
            value: g,
            expected: "file, package",
        })?,
        None => Granularity::default(),
    };

    let mut dependencies = DependencyPolicy::default();
    let d = dto.dependencies;
    if let Some(flag) = d.count_type_only {
        dependencies.count_type_only = flag;
    }
    if let Some(s) = d.unused_severity {
        dependencies.unused_severity = parse_severity(&s, "dependencies.unused_severity")?;
    }
    if let Some(s) = d.missing_severity {
        dependencies.missing_severity = parse_severity(&s, "dependencies.missing_severity")?;
    }
    if let Some(s) = d.unresolved_severity {
        dependencies.unresolved_severity = parse_severity(&s, "dependencies.unresolved_severity")?;
    }
    if let Some(ignore) = d.ignore {
        dependencies.ignore = compile_globs(&ignore, "dependencies.ignore")?;
    }

    let mut architecture = ArchitecturePolicy::default();
    if let Some(flag) = dto.architecture.enforce_public_api {
        architecture.enforce_public_api = flag;
    }
    if let Some(globs) = dto.architecture.allow_barrel_exports {
        architecture.allow_barrel_exports =
            compile_globs(&globs, "architecture.allow_barrel_exports")?;
    }

    let layers = dto
        .layers
        .iter()
        .enumerate()
        .map(|(i, l)| convert_layer(l, i))
        .collect::<Result<Vec<_>, _>>()?;
    let layers = LayerTable::new(layers).map_err(ConfigError::Layers)?;

    Ok(Config {
        analyzer,
        cache,
        categories,
        granularity,
        dependencies,
        architecture,
        layers,
        fingerprint,
        origin,
    })
}

fn convert_layer(dto: &LayerDto, index: usize) -> Result<Layer, ConfigError> {
    let ctx = format!("layers[{index}]");
    let patterns = compile_globs(&dto.paths, &format!("{ctx}.paths"))?;
    Layer::new(&dto.name, patterns, dto.allow.iter().cloned()).map_err(|e| {
        ConfigError::Invalid {
            context: ctx,
            source: e,
        }
    })
}

fn compile_globs(patterns: &[String], context: &str) -> Result<Vec<GlobPattern>, ConfigError> {
    patterns
        .iter()
        .enumerate()
        .map(|(i, p)| {
            GlobPattern::new(p).map_err(|e| ConfigError::Invalid {
                context: format!("{context}[{i}]"),
                source: e,
            })
        })
        .collect()
}

/// Strips a leading `./` and trailing `/`; the workspace root itself becomes `"."`.
fn normalize_package(pattern: &str) -> String {
    let trimmed = pattern.trim_end_matches('/');
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed == "." {
        ".".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_severity(value: &str, context: &str) -> Result<Severity, ConfigError> {
    Severity::from_name(value).ok_or_else(|| ConfigError::UnknownValue {
        context: context.to_string(),
        value: value.to_string(),
        expected: "error, warning, info",
    })
}

/// Compiles a static default glob list. Invalid entries are skipped.
pub(crate) fn default_globs(patterns: &[&str]) -> Vec<GlobPattern> {
    patterns
        .iter()
        .filter_map(|p| GlobPattern::new(p).ok())
        .collect()
}

/// Resolves `path` against `base` unless it is already absolute.
#[must_use]
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(s: &str) -> Result<Config, ConfigError> {
        load(toml::from_str(s).unwrap(), None)
    }

    #[test]
    fn defaults_apply_for_missing_sections() {
        let config = load_str("").unwrap();
        assert_eq!(config.analyzer.packages.len(), 1);
        assert_eq!(config.analyzer.packages[0].as_str(), ".");
        assert!(config.cache.enabled);
        assert_eq!(config.dependencies.unused_severity, Severity::Warning);
        assert_eq!(config.dependencies.missing_severity, Severity::Error);
        assert!(config.dependencies.count_type_only);
        assert!(!config.architecture.enforce_public_api);
        assert!(config.layers.is_empty());
        assert!(config.analyzer.concurrency >= 1);
    }

    #[test]
    fn package_patterns_are_normalized() {
        let config = load_str("[analyzer]\npackages = [\"./\", \"./packages/*/\"]\n").unwrap();
        let raw: Vec<&str> = config.analyzer.packages.iter().map(GlobPattern::as_str).collect();
        assert_eq!(raw, vec![".", "packages/*"]);
    }

    #[test]
    fn cache_dir_at_the_workspace_root_is_rejected() {
        for dir in [".", "", "./", "src/.."] {
            let err = load_str(&format!("[cache]\ndir = \"{dir}\"\n")).unwrap_err();
            assert!(matches!(err, ConfigError::CacheDirIsRoot { .. }), "{dir}");
        }
        let config = load_str("[cache]\ndir = \"tmp/cache\"\n").unwrap();
        assert_eq!(config.cache.dir, PathBuf::from("tmp/cache"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(matches!(
            load_str("[analyzer]\nconcurrency = 0\n"),
            Err(ConfigError::ZeroConcurrency)
        ));
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = load_str("[categories.style]\nenabled = false\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCategory { name } if name == "style"));
    }

    #[test]
    fn category_override_is_parsed() {
        let config =
            load_str("[categories.circular-import]\nseverity = \"warning\"\nenabled = true\n")
                .unwrap();
        let policy = config.category(Category::CircularImport);
        assert!(policy.enabled);
        assert_eq!(policy.severity, Some(Severity::Warning));
        assert_eq!(config.category(Category::Dependency), CategoryPolicy::default());
    }

    #[test]
    fn invalid_severity_names_context() {
        let err = load_str("[dependencies]\nunused_severity = \"fatal\"\n").unwrap_err();
        assert!(err.to_string().contains("dependencies.unused_severity"));
        assert!(err.to_string().contains("fatal"));
    }

    #[test]
    fn invalid_granularity_is_rejected() {
        assert!(matches!(
            load_str("[cycles]\ngranularity = \"module\"\n"),
            Err(ConfigError::UnknownValue { .. })
        ));
    }

    #[test]
    fn bad_layer_glob_reports_path() {
        let err = load_str("[[layers]]\nname = \"core\"\npaths = [\"[oops\"]\n").unwrap_err();
        assert!(err.to_string().contains("layers[0].paths[0]"));
    }

    #[test]
    fn layer_cross_refs_are_collected() {
        let err = load_str(
            r#"
[[layers]]
name = "core"
paths = ["core/**"]
allow = ["nope"]

[[layers]]
name = "core"
paths = ["other/**"]
"#,
        )
        .unwrap_err();
        match err {
            ConfigError::Layers(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_layer_name_is_rejected() {
        let err = load_str("[[layers]]\nname = \"\"\npaths = [\"a/**\"]\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                source: ModelError::EmptyLayerName,
                ..
            }
        ));
    }
}
