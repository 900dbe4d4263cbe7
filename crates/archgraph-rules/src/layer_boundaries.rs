//! Analyzer for architecture layer boundaries.
//!
//! # Rationale
//!
//! Declared layers only mean something if imports respect them. A module may
//! import its own layer and the layers listed in its layer's `allow` list;
//! every other cross-layer import is a violation.
//!
//! # Configuration
//!
//! - `[[layers]]`: `name`, `paths` globs and `allow` list. A module belongs
//!   to the first declared layer whose patterns match it.
//! - `architecture.enforce_public_api`: when `false` (default), re-export-only
//!   files are not checked as import sources.
//! - `architecture.allow_barrel_exports`: re-export-only files that stay
//!   exempt even when `enforce_public_api` is on.
//!
//! An `allow` relation that loops back on itself is reported as a
//! configuration warning.

use std::collections::HashSet;

use archgraph_core::graph::EdgeView;
use archgraph_core::{
    AnalysisContext, Category, Diagnostic, GraphAnalyzer, Label, Location, ModuleNode, Severity,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::circular_import::shortest_cycle;

/// Code for a forbidden cross-layer import.
pub const CODE: &str = "AG101";

/// Rule name for forbidden cross-layer imports.
pub const NAME: &str = "layer-violation";

/// Code for a cyclic `allow` relation.
pub const LAYER_CYCLE_CODE: &str = "AG102";

/// Rule name for cyclic `allow` relations.
pub const LAYER_CYCLE_NAME: &str = "layer-cycle";

/// Validates imports against the declared layers.
#[derive(Debug, Clone)]
pub struct LayerBoundaries {
    /// Severity of layer violations.
    pub severity: Severity,
}

impl Default for LayerBoundaries {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerBoundaries {
    /// Creates the analyzer with error severity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            severity: Severity::Error,
        }
    }

    /// Sets the severity level.
    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    fn violation(
        &self,
        ctx: &AnalysisContext<'_>,
        view: &EdgeView<'_>,
        from: (&ModuleNode, &str),
        to: (&ModuleNode, &str),
    ) -> Diagnostic {
        let (from_module, from_layer) = from;
        let (to_module, to_layer) = to;

        let allowed: Vec<&str> = ctx
            .config
            .layers
            .get(from_layer)
            .map(|l| l.allow().iter().map(String::as_str).collect())
            .unwrap_or_default();
        let help = if allowed.is_empty() {
            format!("layer `{from_layer}` may only import from itself")
        } else {
            format!(
                "layer `{from_layer}` may import from itself and: {}",
                allowed.join(", ")
            )
        };

        Diagnostic::new(
            CODE,
            NAME,
            Category::Architecture,
            self.severity,
            Location::new(&from_module.path, view.edge.line, view.edge.column),
            format!(
                "layer `{from_layer}` must not import layer `{to_layer}`: \
                 `{}` imports `{}` via `{}`",
                from_module.path, to_module.path, view.edge.specifier
            ),
        )
        .with_evidence(Label::new(
            Location::file(&to_module.path),
            format!("`{}` belongs to layer `{to_layer}`", to_module.path),
        ))
        .with_help(help)
    }

    fn layer_cycles(ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        let layers = ctx.config.layers.layers();
        let mut relation: DiGraph<usize, ()> = DiGraph::with_capacity(layers.len(), 0);
        for i in 0..layers.len() {
            relation.add_node(i);
        }
        for (i, layer) in layers.iter().enumerate() {
            for allowed in layer.allow() {
                if let Some(j) = layers.iter().position(|l| l.name() == allowed) {
                    if i != j {
                        relation.add_edge(NodeIndex::new(i), NodeIndex::new(j), ());
                    }
                }
            }
        }

        let mut out = Vec::new();
        for scc in tarjan_scc(&relation) {
            if scc.len() < 2 {
                continue;
            }
            let members: HashSet<NodeIndex> = scc.iter().copied().collect();
            let Some(&start) = scc.iter().min() else {
                continue;
            };
            let neighbors = |n: NodeIndex| {
                let mut next: Vec<NodeIndex> = relation
                    .neighbors(n)
                    .filter(|to| members.contains(to))
                    .collect();
                next.sort();
                next
            };
            let Some(cycle) = shortest_cycle(start, neighbors) else {
                continue;
            };
            let mut names: Vec<&str> = cycle
                .iter()
                .filter_map(|n| layers.get(n.index()).map(|l| l.name()))
                .collect();
            if let Some(&first) = names.first() {
                names.push(first);
            }
            out.push(
                Diagnostic::new(
                    LAYER_CYCLE_CODE,
                    LAYER_CYCLE_NAME,
                    Category::Configuration,
                    Severity::Warning,
                    Location::file(ctx.config_label),
                    format!(
                        "allowed imports between layers form a cycle: {}",
                        names.join(" -> ")
                    ),
                )
                .with_help(
                    "layers that may import each other act as one layer; \
                     merge them or drop one direction",
                ),
            );
        }
        out
    }
}

impl GraphAnalyzer for LayerBoundaries {
    fn name(&self) -> &'static str {
        "layer-boundaries"
    }

    fn category(&self) -> Category {
        Category::Architecture
    }

    fn codes(&self) -> &'static [&'static str] {
        &[CODE, LAYER_CYCLE_CODE]
    }

    fn description(&self) -> &'static str {
        "Checks imports against the declared layers and their allowed imports"
    }

    fn fingerprint(&self) -> String {
        self.severity.to_string()
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        if ctx.config.layers.is_empty() {
            return Vec::new();
        }
        let graph = ctx.graph;
        let mut out = Self::layer_cycles(ctx);

        for view in graph.edges() {
            let (Some(from), Some(to)) = (graph.module(view.from), graph.module(view.to)) else {
                continue;
            };
            let (Some(from_layer), Some(to_layer)) = (from.layer.as_deref(), to.layer.as_deref())
            else {
                continue;
            };
            if ctx.config.layers.allows(from_layer, to_layer) {
                continue;
            }
            if ctx
                .config
                .architecture
                .exempts(&from.path, from.reexport_only)
            {
                debug!(file = %from.path, "barrel file exempt from layer check");
                continue;
            }
            out.push(self.violation(ctx, &view, (from, from_layer), (to, to_layer)));
        }
        out
    }
}
