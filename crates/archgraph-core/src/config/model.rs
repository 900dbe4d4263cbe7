//! Validated configuration model.
//!
//! No serde, no I/O. Invariants are enforced at construction time.

use crate::types::Severity;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// A validated glob pattern for `/`-separated relative paths.
///
/// `*` never crosses a `/`; `**` matches any number of directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    raw: String,
    compiled: glob::Pattern,
}

const MATCH_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl GlobPattern {
    /// Creates a new glob pattern.
    ///
    /// # Errors
    ///
    /// Returns error if the pattern is empty or has invalid glob syntax.
    pub fn new(pattern: &str) -> Result<Self, ModelError> {
        if pattern.is_empty() {
            return Err(ModelError::EmptyGlobPattern);
        }
        let compiled = glob::Pattern::new(pattern).map_err(|e| ModelError::InvalidGlobPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            compiled,
        })
    }

    /// Tests whether a relative `/`-separated path matches this pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        if self.compiled.matches_with(path, MATCH_OPTIONS) {
            return true;
        }
        // `dir/**` also claims everything below `dir` by prefix.
        if let Some(prefix) = self.raw.strip_suffix("/**") {
            let normalized = prefix.trim_end_matches('/');
            if !normalized.contains(['*', '?', '[']) {
                return path.starts_with(normalized)
                    && path.as_bytes().get(normalized.len()) == Some(&b'/');
            }
        }
        false
    }

    /// Returns the pattern as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Returns true if any pattern in the list matches.
#[must_use]
pub fn any_match(patterns: &[GlobPattern], path: &str) -> bool {
    patterns.iter().any(|p| p.matches(path))
}

/// A named architecture layer.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    patterns: Vec<GlobPattern>,
    allow: BTreeSet<String>,
}

impl Layer {
    /// Creates a new layer.
    ///
    /// # Errors
    ///
    /// Returns error if the name is blank or there are no patterns.
    pub fn new(
        name: &str,
        patterns: Vec<GlobPattern>,
        allow: impl IntoIterator<Item = String>,
    ) -> Result<Self, ModelError> {
        if name.trim().is_empty() {
            return Err(ModelError::EmptyLayerName);
        }
        if patterns.is_empty() {
            return Err(ModelError::EmptyLayerPaths {
                layer: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            patterns,
            allow: allow.into_iter().collect(),
        })
    }

    /// Layer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member path patterns.
    #[must_use]
    pub fn patterns(&self) -> &[GlobPattern] {
        &self.patterns
    }

    /// Names of layers this layer may import from (excluding itself).
    #[must_use]
    pub fn allow(&self) -> &BTreeSet<String> {
        &self.allow
    }

    /// Tests whether a path belongs to this layer.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        any_match(&self.patterns, path)
    }
}

/// Ordered, cross-validated layer list.
///
/// Membership is first-declared-wins: a path belongs to the first layer in
/// declaration order whose patterns match, regardless of pattern specificity.
#[derive(Debug, Clone, Default)]
pub struct LayerTable {
    layers: Vec<Layer>,
}

impl LayerTable {
    /// Creates a layer table, checking names are unique and `allow` entries resolve.
    ///
    /// # Errors
    ///
    /// Returns all cross-reference errors found.
    pub fn new(layers: Vec<Layer>) -> Result<Self, Vec<ModelError>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        for layer in &layers {
            if !seen.insert(layer.name.as_str()) {
                errors.push(ModelError::DuplicateLayer {
                    layer: layer.name.clone(),
                });
            }
        }
        for layer in &layers {
            for allowed in &layer.allow {
                if !seen.contains(allowed.as_str()) {
                    errors.push(ModelError::UnknownLayerRef {
                        layer: layer.name.clone(),
                        reference: allowed.clone(),
                    });
                }
            }
        }
        if errors.is_empty() {
            Ok(Self { layers })
        } else {
            Err(errors)
        }
    }

    /// Layers in declaration order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns true when no layers are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Looks up a layer by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Returns the first declared layer containing the path.
    #[must_use]
    pub fn assign(&self, path: &str) -> Option<&str> {
        self.layers
            .iter()
            .find(|l| l.contains(path))
            .map(Layer::name)
    }

    /// Tests whether `from` may import `to`. Same-layer imports are always allowed.
    #[must_use]
    pub fn allows(&self, from: &str, to: &str) -> bool {
        from == to || self.get(from).is_some_and(|l| l.allow.contains(to))
    }
}

/// Graph granularity used by the circular import detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// One node per source file.
    #[default]
    File,
    /// One node per package.
    Package,
}

impl Granularity {
    /// Parses `"file"` or `"package"`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "file" => Some(Self::File),
            "package" => Some(Self::Package),
            _ => None,
        }
    }
}

/// Per-category reporting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPolicy {
    /// Whether diagnostics of this category are kept.
    pub enabled: bool,
    /// Severity applied to every diagnostic of the category, if set.
    pub severity: Option<Severity>,
}

impl Default for CategoryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: None,
        }
    }
}

/// Validation errors for model construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Glob pattern is empty.
    #[error("glob pattern must not be empty")]
    EmptyGlobPattern,

    /// Glob pattern has invalid syntax.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern {
        /// The invalid pattern.
        pattern: String,
        /// Parse error reason.
        reason: String,
    },

    /// Layer name is empty.
    #[error("layer name must not be empty")]
    EmptyLayerName,

    /// Layer has no member patterns.
    #[error("layer '{layer}' must declare at least one path pattern")]
    EmptyLayerPaths {
        /// The layer.
        layer: String,
    },

    /// Two layers share a name.
    #[error("duplicate layer name '{layer}'")]
    DuplicateLayer {
        /// The duplicated name.
        layer: String,
    },

    /// An `allow` entry names an undeclared layer.
    #[error("layer '{layer}' allows unknown layer '{reference}'")]
    UnknownLayerRef {
        /// The referencing layer.
        layer: String,
        /// The unknown name.
        reference: String,
    },
}
