//! Core types for diagnostics and run reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message, does not fail a run.
    Info,
    /// Warning that should be addressed.
    Warning,
    /// Error that must be fixed.
    Error,
}

impl Severity {
    /// Parses a lowercase severity name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Diagnostic category. Declaration order is the report sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Declared vs. used package dependencies, unresolved imports.
    Dependency,
    /// Malformed settings, manifests or source files.
    Configuration,
    /// Layer boundary violations.
    Architecture,
    /// Import cycles.
    CircularImport,
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Self; 4] = [
        Self::Dependency,
        Self::Configuration,
        Self::Architecture,
        Self::CircularImport,
    ];

    /// Returns the kebab-case name used in configuration and output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dependency => "dependency",
            Self::Configuration => "configuration",
            Self::Architecture => "architecture",
            Self::CircularImport => "circular-import",
        }
    }

    /// Parses a kebab-case category name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source code location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    /// File path relative to the workspace root.
    pub file: PathBuf,
    /// Line number (1-indexed, 0 when the whole file is meant).
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown).
    pub column: usize,
}

impl Location {
    /// Creates a new location with explicit values.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Creates a location referring to a whole file.
    #[must_use]
    pub fn file(file: impl Into<PathBuf>) -> Self {
        Self::new(file, 0, 0)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// A labeled location used as evidence for a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Location of the label.
    pub location: Location,
    /// Message for this label.
    pub message: String,
}

impl Label {
    /// Creates a new label.
    #[must_use]
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

/// A finding produced by the scanner, parser, graph builder or an analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code (e.g., "AG001").
    pub code: String,
    /// Rule name (e.g., "circular-import").
    pub rule: String,
    /// Category this finding belongs to.
    pub category: Category,
    /// Severity of this finding.
    pub severity: Severity,
    /// Lowest severity an override may lower this finding to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<Severity>,
    /// Primary location.
    pub location: Location,
    /// Human-readable message.
    pub message: String,
    /// Optional hint for fixing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Ordered evidence (e.g., every hop of a cycle).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Label>,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        rule: impl Into<String>,
        category: Category,
        severity: Severity,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            rule: rule.into(),
            category,
            severity,
            floor: None,
            location,
            message: message.into(),
            help: None,
            evidence: Vec::new(),
        }
    }

    /// Sets a severity floor and raises the current severity to it.
    #[must_use]
    pub fn with_floor(mut self, floor: Severity) -> Self {
        self.floor = Some(floor);
        self.severity = self.severity.max(floor);
        self
    }

    /// Adds a help message.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Adds an evidence label.
    #[must_use]
    pub fn with_evidence(mut self, label: Label) -> Self {
        self.evidence.push(label);
        self
    }

    /// Replaces the severity, never going below the floor.
    pub fn override_severity(&mut self, severity: Severity) {
        self.severity = self.floor.map_or(severity, |floor| severity.max(floor));
    }

    /// Formats the diagnostic for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = format!("{} {} at {}\n", self.code, self.rule, self.location);
        let _ = writeln!(output, "  {}: {}", self.severity, self.message);
        for label in &self.evidence {
            let _ = writeln!(output, "  - {}: {}", label.location, label.message);
        }
        if let Some(help) = &self.help {
            let _ = writeln!(output, "  = help: {help}");
        }
        output
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} [{}] {}",
            self.location, self.severity, self.code, self.message
        )
    }
}

/// Sorts diagnostics into report order: category, file, line, then tie-breakers.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.location.file.cmp(&b.location.file))
            .then(a.location.line.cmp(&b.location.line))
            .then(a.location.column.cmp(&b.location.column))
            .then_with(|| a.code.cmp(&b.code))
            .then_with(|| a.message.cmp(&b.message))
    });
}

/// Per-severity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Error count.
    pub error: usize,
    /// Warning count.
    pub warning: usize,
    /// Info count.
    pub info: usize,
}

impl SeverityCounts {
    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Summary of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of source files scanned.
    pub files_scanned: usize,
    /// Number of packages discovered.
    pub packages: usize,
    /// Number of resolved import edges in the graph.
    pub edges: usize,
    /// Diagnostic counts per category and severity.
    pub counts: BTreeMap<Category, SeverityCounts>,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
    /// Per-file cache hits.
    pub cache_hits: usize,
    /// Per-file cache misses.
    pub cache_misses: usize,
}

impl RunSummary {
    /// Recomputes the per-category counts from a diagnostic list.
    pub fn count(&mut self, diagnostics: &[Diagnostic]) {
        self.counts.clear();
        for d in diagnostics {
            self.counts.entry(d.category).or_default().add(d.severity);
        }
    }

    /// Fraction of per-file cache lookups that hit, `0.0` when nothing was looked up.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Result of an analysis run: ordered diagnostics plus a summary.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// All diagnostics, in report order.
    pub diagnostics: Vec<Diagnostic>,
    /// Run summary.
    pub summary: RunSummary,
}

impl AnalysisReport {
    /// Returns true if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.has_diagnostics_at(Severity::Error)
    }

    /// Checks if any diagnostic meets or exceeds the given severity.
    #[must_use]
    pub fn has_diagnostics_at(&self, severity: Severity) -> bool {
        self.diagnostics.iter().any(|d| d.severity >= severity)
    }

    /// Returns diagnostics of one category.
    #[must_use]
    pub fn by_category(&self, category: Category) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Returns diagnostics produced by one rule.
    #[must_use]
    pub fn by_rule(&self, rule: &str) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.rule == rule).collect()
    }

    /// Counts diagnostics by severity as `(errors, warnings, infos)`.
    #[must_use]
    pub fn count_by_severity(&self) -> (usize, usize, usize) {
        let mut counts = SeverityCounts::default();
        for d in &self.diagnostics {
            counts.add(d.severity);
        }
        (counts.error, counts.warning, counts.info)
    }
}
