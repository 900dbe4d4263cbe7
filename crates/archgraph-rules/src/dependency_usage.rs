//! Analyzer comparing declared and imported package dependencies.
//!
//! # Rationale
//!
//! A dependency listed in `package.json` but never imported bloats installs.
//! A package imported but not listed only works because a neighbour happens
//! to install it, and breaks once that changes.
//!
//! # Configuration
//!
//! - `dependencies.count_type_only`: whether `import type` counts as usage
//!   (default: true)
//! - `dependencies.unused_severity` (default: warning)
//! - `dependencies.missing_severity` (default: error, never below warning)
//! - `dependencies.ignore`: dependency name globs skipped by both checks

use std::collections::BTreeMap;

use archgraph_core::graph::resolve::split_bare;
use archgraph_core::graph::{EdgeView, ExternalOrigin, Node};
use archgraph_core::{
    AnalysisContext, Category, Diagnostic, GraphAnalyzer, ImportGraph, ImportKind, Label,
    Location, PackageUnit, Severity,
};
use tracing::debug;

/// Code for a declared dependency nothing imports.
pub const UNUSED_CODE: &str = "AG201";

/// Rule name for unused dependencies.
pub const UNUSED_NAME: &str = "unused-dependency";

/// Code for an imported package missing from the manifest.
pub const MISSING_CODE: &str = "AG202";

/// Rule name for missing dependencies.
pub const MISSING_NAME: &str = "missing-dependency";

/// Reports unused and missing package dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyUsage;

impl DependencyUsage {
    /// Creates the analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl GraphAnalyzer for DependencyUsage {
    fn name(&self) -> &'static str {
        "dependency-usage"
    }

    fn category(&self) -> Category {
        Category::Dependency
    }

    fn codes(&self) -> &'static [&'static str] {
        &[UNUSED_CODE, MISSING_CODE]
    }

    fn description(&self) -> &'static str {
        "Compares package.json dependencies with the packages actually imported"
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        let graph = ctx.graph;
        let policy = &ctx.config.dependencies;
        let mut out = Vec::new();

        for package in graph.packages() {
            let Some(declared) = &package.declared else {
                debug!(package = %package.name, "manifest unusable, skipping dependency check");
                continue;
            };
            let used = references(graph, package, policy.count_type_only);

            for name in declared {
                if used.contains_key(name.as_str()) || policy.is_ignored(name) {
                    continue;
                }
                let line = package.dependency_lines.get(name).copied().unwrap_or(0);
                out.push(
                    Diagnostic::new(
                        UNUSED_CODE,
                        UNUSED_NAME,
                        Category::Dependency,
                        policy.unused_severity,
                        Location::new(&package.manifest, line, usize::from(line > 0)),
                        format!(
                            "`{name}` is declared by package `{}` but never imported",
                            package.name
                        ),
                    )
                    .with_help(format!(
                        "remove `{name}` from {}, or add it to dependencies.ignore",
                        package.manifest
                    )),
                );
            }

            for (name, edges) in &used {
                if declared.contains(*name) || policy.is_ignored(name) {
                    continue;
                }
                let Some((first, rest)) = edges.split_first() else {
                    continue;
                };
                let mut diagnostic = Diagnostic::new(
                    MISSING_CODE,
                    MISSING_NAME,
                    Category::Dependency,
                    policy.missing_severity,
                    edge_location(graph, first),
                    format!(
                        "package `{}` imports `{name}` but does not declare it in {}",
                        package.name, package.manifest
                    ),
                )
                .with_floor(Severity::Warning)
                .with_help(format!("add `{name}` to {}", package.manifest));
                for edge in rest {
                    diagnostic = diagnostic.with_evidence(Label::new(
                        edge_location(graph, edge),
                        format!("also imported via `{}`", edge.edge.specifier),
                    ));
                }
                out.push(diagnostic);
            }
        }
        out
    }
}

/// Dependency names referenced by a package, each with its importing edges
/// in scan order.
fn references<'g>(
    graph: &'g ImportGraph,
    package: &'g PackageUnit,
    count_type_only: bool,
) -> BTreeMap<&'g str, Vec<EdgeView<'g>>> {
    let mut used: BTreeMap<&str, Vec<EdgeView<'_>>> = BTreeMap::new();
    for &module in &package.modules {
        for view in graph.outgoing(module) {
            if view.edge.kind == ImportKind::TypeOnly && !count_type_only {
                continue;
            }
            let name = match graph.node(view.to) {
                Node::External(external) => match external.origin {
                    ExternalOrigin::Builtin => continue,
                    ExternalOrigin::Registry | ExternalOrigin::Workspace => external.name.as_str(),
                },
                // a workspace package imported by name
                Node::Module(_) if view.edge.is_bare() => split_bare(&view.edge.specifier).0,
                Node::Module(_) => continue,
            };
            if name == package.name {
                continue;
            }
            used.entry(name).or_default().push(view);
        }
    }
    used
}

fn edge_location(graph: &ImportGraph, view: &EdgeView<'_>) -> Location {
    Location::new(graph.label(view.from), view.edge.line, view.edge.column)
}
