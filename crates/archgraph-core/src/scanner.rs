//! Source scanner: enumerates source files and package roots.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::Fingerprint;
use crate::config::{model::any_match, AnalyzerSettings};
use crate::types::{Category, Diagnostic, Location, Severity};
use crate::utils::paths;

const MANIFEST: &str = "package.json";

const DEPENDENCY_SECTIONS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

const ENTRY_FIELDS: &[&str] = &["source", "module", "main", "types"];

/// Code for a package pattern that matched no package root.
pub const UNMATCHED_PACKAGE_PATTERN: &str = "AG302";
/// Code for a `package.json` that could not be read or parsed.
pub const INVALID_MANIFEST: &str = "AG303";

/// A discovered package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRoot {
    /// Manifest `name`, or the directory name.
    pub name: String,
    /// Canonical root directory (`""` for the workspace root).
    pub root: String,
    /// Canonical path of the manifest.
    pub manifest: String,
    /// Declared dependency names; `None` when the manifest is unusable.
    pub declared: Option<BTreeSet<String>>,
    /// Line of each dependency key in the manifest.
    pub dependency_lines: BTreeMap<String, usize>,
    /// Entry fields (`source`, `module`, `main`, `types`) in lookup order.
    pub entry_points: Vec<String>,
    /// Hash of the raw manifest bytes.
    pub manifest_hash: String,
}

/// A source file owned by a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Canonical root-relative path.
    pub path: String,
    /// Absolute filesystem path.
    pub absolute: PathBuf,
    /// Index into [`ScanResult::packages`].
    pub package: usize,
}

/// Output of a scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Files in scan order (lexicographic by canonical path).
    pub files: Vec<SourceFile>,
    /// Package roots, sorted by root directory.
    pub packages: Vec<PackageRoot>,
    /// Configuration diagnostics raised while scanning.
    pub diagnostics: Vec<Diagnostic>,
}

/// Errors that stop a scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The root directory could not be walked.
    #[error("failed to walk {root}: {source}")]
    Walk {
        /// Workspace root.
        root: PathBuf,
        /// Underlying walker error.
        source: ignore::Error,
    },

    /// No package root matched any package pattern.
    #[error("no package roots found under {root}")]
    NoPackages {
        /// Workspace root.
        root: PathBuf,
    },
}

/// Walks a workspace and assigns files to packages.
pub struct Scanner<'a> {
    root: &'a Path,
    settings: &'a AnalyzerSettings,
    extensions: BTreeSet<&'static str>,
    config_label: String,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner over `root` using the `[analyzer]` settings.
    #[must_use]
    pub fn new(root: &'a Path, settings: &'a AnalyzerSettings) -> Self {
        Self {
            root,
            settings,
            extensions: BTreeSet::new(),
            config_label: "archgraph.toml".to_string(),
        }
    }

    /// Restricts files to these extensions (those some parser handles).
    #[must_use]
    pub fn extensions(mut self, extensions: impl IntoIterator<Item = &'static str>) -> Self {
        self.extensions.extend(extensions);
        self
    }

    /// Path used as the location of configuration diagnostics.
    #[must_use]
    pub fn config_label(mut self, label: impl Into<String>) -> Self {
        self.config_label = label.into();
        self
    }

    /// Runs the scan.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the root cannot be walked or no package
    /// root is found.
    pub fn scan(&self) -> Result<ScanResult, ScanError> {
        let entries = self.walk()?;
        let mut result = ScanResult::default();

        let mut matched = vec![false; self.settings.packages.len()];
        for rel in &entries {
            if paths::file_name(rel) != MANIFEST || any_match(&self.settings.exclude, rel) {
                continue;
            }
            let dir = paths::parent(rel);
            let shown = paths::display_dir(dir);
            let mut hit = false;
            for (i, pattern) in self.settings.packages.iter().enumerate() {
                if pattern.matches(shown) {
                    matched[i] = true;
                    hit = true;
                }
            }
            if hit {
                let (package, diagnostic) = self.read_manifest(dir, rel);
                result.diagnostics.extend(diagnostic);
                result.packages.push(package);
            }
        }

        for (pattern, hit) in self.settings.packages.iter().zip(&matched) {
            if !hit {
                result.diagnostics.push(
                    Diagnostic::new(
                        UNMATCHED_PACKAGE_PATTERN,
                        "unmatched-package-pattern",
                        Category::Configuration,
                        Severity::Warning,
                        Location::file(&self.config_label),
                        format!("package pattern `{pattern}` matched no package root"),
                    )
                    .with_help("package roots are directories containing package.json"),
                );
            }
        }

        if result.packages.is_empty() {
            return Err(ScanError::NoPackages {
                root: self.root.to_path_buf(),
            });
        }
        result.packages.sort_by(|a, b| a.root.cmp(&b.root));

        for rel in entries {
            if any_match(&self.settings.exclude, &rel) || !any_match(&self.settings.include, &rel)
            {
                continue;
            }
            if !paths::extension(&rel).is_some_and(|ext| self.extensions.contains(ext)) {
                debug!(file = %rel, "no parser for extension, skipping");
                continue;
            }
            let Some(package) = owning_package(&result.packages, &rel) else {
                debug!(file = %rel, "outside every package root, skipping");
                continue;
            };
            result.files.push(SourceFile {
                absolute: self.root.join(&rel),
                path: rel,
                package,
            });
        }

        debug!(
            files = result.files.len(),
            packages = result.packages.len(),
            "scan complete"
        );
        Ok(result)
    }

    /// Returns every file below the root as a sorted canonical path.
    fn walk(&self) -> Result<Vec<String>, ScanError> {
        let respect = self.settings.respect_gitignore;
        let walker = WalkBuilder::new(self.root)
            .hidden(false)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .ignore(respect)
            .require_git(false)
            .parents(false)
            .filter_entry(|entry| entry.file_name() != ".git")
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == Some(0) => {
                    return Err(ScanError::Walk {
                        root: self.root.to_path_buf(),
                        source: err,
                    })
                }
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(self.root) {
                files.push(paths::to_slash(rel));
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_manifest(&self, dir: &str, rel: &str) -> (PackageRoot, Option<Diagnostic>) {
        let fallback_name = if dir.is_empty() {
            self.root
                .file_name()
                .map_or_else(|| ".".to_string(), |n| n.to_string_lossy().into_owned())
        } else {
            paths::file_name(dir).to_string()
        };
        let mut package = PackageRoot {
            name: fallback_name,
            root: dir.to_string(),
            manifest: rel.to_string(),
            declared: None,
            dependency_lines: BTreeMap::new(),
            entry_points: Vec::new(),
            manifest_hash: String::new(),
        };

        let bytes = match std::fs::read(self.root.join(rel)) {
            Ok(bytes) => bytes,
            Err(err) => {
                let diagnostic = invalid_manifest(rel, 0, &format!("cannot read manifest: {err}"));
                return (package, Some(diagnostic));
            }
        };
        package.manifest_hash = Fingerprint::new("manifest")
            .field(&bytes)
            .finish()
            .into_hex();

        let text = String::from_utf8_lossy(&bytes);
        let value: Value = match serde_json::from_str(&text) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => {
                let diagnostic = invalid_manifest(rel, 0, "manifest is not a JSON object");
                return (package, Some(diagnostic));
            }
            Err(err) => {
                let diagnostic = invalid_manifest(rel, err.line(), &format!("invalid JSON: {err}"));
                return (package, Some(diagnostic));
            }
        };

        if let Some(name) = value.get("name").and_then(Value::as_str) {
            if !name.is_empty() {
                package.name = name.to_string();
            }
        }
        let mut declared = BTreeSet::new();
        for section in DEPENDENCY_SECTIONS {
            if let Some(deps) = value.get(*section).and_then(Value::as_object) {
                for key in deps.keys() {
                    package
                        .dependency_lines
                        .entry(key.clone())
                        .or_insert_with(|| key_line(&text, section, key));
                    declared.insert(key.clone());
                }
            }
        }
        package.declared = Some(declared);
        package.entry_points = ENTRY_FIELDS
            .iter()
            .filter_map(|f| value.get(*f).and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        (package, None)
    }
}

/// Longest-prefix package root containing the path.
fn owning_package(packages: &[PackageRoot], path: &str) -> Option<usize> {
    packages
        .iter()
        .enumerate()
        .filter(|(_, p)| paths::is_within(path, &p.root))
        .max_by_key(|(_, p)| p.root.len())
        .map(|(i, _)| i)
}

fn invalid_manifest(rel: &str, line: usize, message: &str) -> Diagnostic {
    Diagnostic::new(
        INVALID_MANIFEST,
        "invalid-manifest",
        Category::Configuration,
        Severity::Warning,
        Location::new(rel, line, 0),
        message.to_string(),
    )
    .with_help("dependency usage is not checked for this package")
}

/// Finds the 1-indexed line of `"key":` inside a dependency section, or 1.
fn key_line(text: &str, section: &str, key: &str) -> usize {
    let header = format!("\"{section}\"");
    let needle = format!("\"{key}\"");
    let start = text.find(&header).map_or(0, |i| i + header.len());
    let mut from = start;
    while let Some(offset) = text[from..].find(&needle) {
        let at = from + offset;
        let after = text[at + needle.len()..].trim_start();
        if after.starts_with(':') {
            return text[..at].matches('\n').count() + 1;
        }
        from = at + needle.len();
    }
    1
}
