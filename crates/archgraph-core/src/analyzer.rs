//! Graph analyzer trait.

use crate::context::AnalysisContext;
use crate::types::{Category, Diagnostic};

/// A read-only analysis over the finished import graph.
///
/// Analyzers run in parallel, each on its own worker, and must not share
/// mutable state. Output order does not matter; the scheduler sorts.
///
/// # Example
///
/// ```ignore
/// use archgraph_core::{AnalysisContext, Category, Diagnostic, GraphAnalyzer};
///
/// pub struct NoOrphans;
///
/// impl GraphAnalyzer for NoOrphans {
///     fn name(&self) -> &'static str { "no-orphans" }
///     fn category(&self) -> Category { Category::Architecture }
///     fn codes(&self) -> &'static [&'static str] { &["AG900"] }
///
///     fn analyze(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
///         Vec::new()
///     }
/// }
/// ```
pub trait GraphAnalyzer: Send + Sync {
    /// Kebab-case analyzer name; part of every analysis cache key.
    fn name(&self) -> &'static str;

    /// Category of the diagnostics this analyzer emits.
    fn category(&self) -> Category;

    /// Codes this analyzer can emit.
    fn codes(&self) -> &'static [&'static str];

    /// Brief description.
    fn description(&self) -> &'static str {
        ""
    }

    /// Version marker. Bump to invalidate cached results.
    fn version(&self) -> &'static str {
        "1"
    }

    /// Settings that change this analyzer's output. Part of the analysis
    /// cache key.
    fn fingerprint(&self) -> String {
        String::new()
    }

    /// Analyzes the graph.
    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic>;
}

/// Boxed analyzer for dynamic dispatch.
pub type AnalyzerBox = Box<dyn GraphAnalyzer>;
