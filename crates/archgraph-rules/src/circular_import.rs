//! Analyzer for circular imports between modules or packages.
//!
//! # Rationale
//!
//! Import cycles make initialization order depend on which module happens to
//! load first, and they prevent splitting code into independently buildable
//! units.
//!
//! # Detection
//!
//! Strongly connected components are found with Tarjan's algorithm. Each
//! component of more than one node yields a single diagnostic for the
//! shortest cycle through its first node in scan order. External nodes have
//! no outgoing edges, so an import of a third-party package never closes a
//! cycle. A module importing itself is reported separately.
//!
//! # Configuration
//!
//! - `cycles.granularity`: `"file"` (default) or `"package"`

use std::collections::{HashMap, HashSet, VecDeque};

use archgraph_core::config::Granularity;
use archgraph_core::graph::EdgeView;
use archgraph_core::{
    AnalysisContext, Category, Diagnostic, GraphAnalyzer, ImportGraph, Label, Location, Severity,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use tracing::debug;

/// Code for a cycle of two or more nodes.
pub const CODE: &str = "AG001";

/// Rule name for cycles.
pub const NAME: &str = "circular-import";

/// Code for a module importing itself.
pub const SELF_IMPORT_CODE: &str = "AG002";

/// Rule name for self imports.
pub const SELF_IMPORT_NAME: &str = "self-import";

/// Reports import cycles.
#[derive(Debug, Clone)]
pub struct CircularImports {
    /// Severity of reported cycles.
    pub severity: Severity,
}

impl Default for CircularImports {
    fn default() -> Self {
        Self::new()
    }
}

impl CircularImports {
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

    fn file_cycles(&self, graph: &ImportGraph) -> Vec<Diagnostic> {
        let mut out = Vec::new();

        for view in graph.edges() {
            if view.from == view.to && graph.module(view.from).is_some() {
                out.push(self.self_import(graph, &view));
            }
        }

        for scc in tarjan_scc(graph.inner()) {
            if scc.len() < 2 {
                continue;
            }
            let members: HashSet<NodeIndex> = scc.iter().copied().collect();
            let Some(&start) = scc.iter().min() else {
                continue;
            };
            let neighbors = |n: NodeIndex| {
                let mut next: Vec<NodeIndex> = graph
                    .outgoing(n)
                    .iter()
                    .map(|e| e.to)
                    .filter(|&to| to != n && members.contains(&to))
                    .collect();
                next.sort();
                next.dedup();
                next
            };
            let Some(cycle) = shortest_cycle(start, neighbors) else {
                continue;
            };
            let hops: Vec<EdgeView<'_>> = cycle_pairs(&cycle)
                .filter_map(|(from, to)| graph.outgoing(from).into_iter().find(|e| e.to == to))
                .collect();
            let names: Vec<&str> = cycle.iter().map(|&n| graph.label(n)).collect();
            debug!(size = scc.len(), cycle = names.len(), "file cycle");
            out.push(self.cycle(graph, &names, &hops, scc.len(), "module"));
        }
        out
    }

    fn package_cycles(&self, graph: &ImportGraph) -> Vec<Diagnostic> {
        let view = graph.package_view();
        let packages = graph.packages();
        let mut out = Vec::new();

        for scc in tarjan_scc(view.inner()) {
            if scc.len() < 2 {
                continue;
            }
            let members: HashSet<NodeIndex> = scc.iter().copied().collect();
            let Some(&start) = scc.iter().min() else {
                continue;
            };
            let neighbors = |n: NodeIndex| {
                let mut next: Vec<NodeIndex> = view
                    .inner()
                    .neighbors(n)
                    .filter(|to| members.contains(to))
                    .collect();
                next.sort();
                next.dedup();
                next
            };
            let Some(cycle) = shortest_cycle(start, neighbors) else {
                continue;
            };
            // each package hop is evidenced by its first realizing file edge
            let hops: Vec<EdgeView<'_>> = cycle_pairs(&cycle)
                .filter_map(|(from, to)| view.realizing(from, to)?.first().copied())
                .filter_map(|id| graph.edge(id))
                .collect();
            let names: Vec<&str> = cycle
                .iter()
                .filter_map(|n| packages.get(n.index()).map(|p| p.name.as_str()))
                .collect();
            debug!(size = scc.len(), cycle = names.len(), "package cycle");
            out.push(self.cycle(graph, &names, &hops, scc.len(), "package"));
        }
        out
    }

    fn cycle(
        &self,
        graph: &ImportGraph,
        names: &[&str],
        hops: &[EdgeView<'_>],
        component: usize,
        unit: &str,
    ) -> Diagnostic {
        let mut chain = names.join(" -> ");
        if let Some(first) = names.first() {
            chain.push_str(" -> ");
            chain.push_str(first);
        }
        let location = hops.first().map_or_else(
            || Location::file(names.first().copied().unwrap_or_default()),
            |e| edge_location(graph, e),
        );

        let mut diagnostic = Diagnostic::new(
            CODE,
            NAME,
            Category::CircularImport,
            self.severity,
            location,
            format!("circular import: {chain}"),
        );
        for hop in hops {
            diagnostic = diagnostic.with_evidence(Label::new(
                edge_location(graph, hop),
                format!("imports `{}` via `{}`", graph.label(hop.to), hop.edge.specifier),
            ));
        }
        let help = if component > names.len() {
            format!(
                "this cycle is part of a group of {component} mutually dependent {unit}s; \
                 move the shared code into a {unit} that imports none of them"
            )
        } else {
            format!("move the shared code into a {unit} that imports none of them")
        };
        diagnostic.with_help(help)
    }

    fn self_import(&self, graph: &ImportGraph, view: &EdgeView<'_>) -> Diagnostic {
        Diagnostic::new(
            SELF_IMPORT_CODE,
            SELF_IMPORT_NAME,
            Category::CircularImport,
            self.severity,
            edge_location(graph, view),
            format!(
                "`{}` imports itself via `{}`",
                graph.label(view.from),
                view.edge.specifier
            ),
        )
        .with_help("remove the import")
    }
}

impl GraphAnalyzer for CircularImports {
    fn name(&self) -> &'static str {
        "circular-imports"
    }

    fn category(&self) -> Category {
        Category::CircularImport
    }

    fn codes(&self) -> &'static [&'static str] {
        &[CODE, SELF_IMPORT_CODE]
    }

    fn description(&self) -> &'static str {
        "Detects cycles in the module or package import graph"
    }

    fn fingerprint(&self) -> String {
        self.severity.to_string()
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        match ctx.config.granularity {
            Granularity::File => self.file_cycles(ctx.graph),
            Granularity::Package => self.package_cycles(ctx.graph),
        }
    }
}

fn edge_location(graph: &ImportGraph, view: &EdgeView<'_>) -> Location {
    Location::new(graph.label(view.from), view.edge.line, view.edge.column)
}

/// Consecutive pairs of a cycle, closing back to the first node.
fn cycle_pairs(cycle: &[NodeIndex]) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
    cycle
        .iter()
        .enumerate()
        .map(move |(i, &from)| (from, cycle[(i + 1) % cycle.len()]))
}

/// Breadth-first search for the shortest path from `start` back to itself.
///
/// Returns the nodes on the cycle beginning with `start`.
pub(crate) fn shortest_cycle<F>(start: NodeIndex, neighbors: F) -> Option<Vec<NodeIndex>>
where
    F: Fn(NodeIndex) -> Vec<NodeIndex>,
{
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    let mut seen = HashSet::from([start]);

    while let Some(node) = queue.pop_front() {
        for next in neighbors(node) {
            if next == start {
                let mut path = vec![node];
                let mut cur = node;
                while cur != start {
                    cur = *parent.get(&cur)?;
                    path.push(cur);
                }
                path.reverse();
                return Some(path);
            }
            if seen.insert(next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run, Static, TypeOnly, Workspace};
    use archgraph_core::Config;

    fn files(diags: &[Diagnostic]) -> Vec<String> {
        diags
            .iter()
            .map(|d| format!("{} {}", d.code, d.message))
            .collect()
    }

    #[test]
    fn three_file_cycle_reported_once_with_evidence() {
        let ws = Workspace::new()
            .package("app", "app", &[])
            .file("app/a.ts", &[("./b", Static)])
            .file("app/b.ts", &[("./c", Static)])
            .file("app/c.ts", &[("lodash", Static), ("./a", TypeOnly)]);
        let diags = run(&CircularImports::new(), ws, &Config::default());

        assert_eq!(
            files(&diags),
            vec!["AG001 circular import: app/a.ts -> app/b.ts -> app/c.ts -> app/a.ts"]
        );
        let d = &diags[0];
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.location.file.to_str(), Some("app/a.ts"));
        assert_eq!(d.location.line, 1);
        let evidence: Vec<String> = d.evidence.iter().map(|l| l.location.to_string()).collect();
        assert_eq!(evidence, vec!["app/a.ts:1:1", "app/b.ts:1:1", "app/c.ts:2:1"]);
    }

    #[test]
    fn severity_is_part_of_the_fingerprint() {
        let warn = CircularImports::new().severity(Severity::Warning);
        assert_eq!(warn.fingerprint(), "warning");
        assert_ne!(warn.fingerprint(), CircularImports::new().fingerprint());
    }

    #[test]
    fn cycle_report_format() {
        let ws = Workspace::new()
            .package("app", "app", &[])
            .file("app/a.ts", &[("./b", Static)])
            .file("app/b.ts", &[("./a", Static)]);
        let diags = run(&CircularImports::new(), ws, &Config::default());
        insta::assert_snapshot!(diags[0].format(), @r"
AG001 circular-import at app/a.ts:1:1
  error: circular import: app/a.ts -> app/b.ts -> app/a.ts
  - app/a.ts:1:1: imports `app/b.ts` via `./b`
  - app/b.ts:1:1: imports `app/a.ts` via `./a`
  = help: move the shared code into a module that imports none of them
");
    }

    #[test]
    fn reports_shortest_cycle_through_first_node() {
        // a -> b -> c -> a and a -> c -> a share one component
        let ws = Workspace::new()
            .package("app", "app", &[])
            .file("app/a.ts", &[("./b", Static), ("./c", Static)])
            .file("app/b.ts", &[("./c", Static)])
            .file("app/c.ts", &[("./a", Static)]);
        let diags = run(&CircularImports::new(), ws, &Config::default());

        assert_eq!(
            files(&diags),
            vec!["AG001 circular import: app/a.ts -> app/c.ts -> app/a.ts"]
        );
        assert!(diags[0].help.as_deref().unwrap_or_default().contains("group of 3"));
    }

    #[test]
    fn separate_components_get_separate_diagnostics() {
        let ws = Workspace::new()
            .package("app", "app", &[])
            .file("app/a.ts", &[("./b", Static)])
            .file("app/b.ts", &[("./a", Static)])
            .file("app/x.ts", &[("./y", Static)])
            .file("app/y.ts", &[("./x", Static), ("./a", Static)]);
        let diags = run(&CircularImports::new(), ws, &Config::default());
        assert_eq!(
            files(&diags),
            vec![
                "AG001 circular import: app/a.ts -> app/b.ts -> app/a.ts",
                "AG001 circular import: app/x.ts -> app/y.ts -> app/x.ts",
            ]
        );
    }

    #[test]
    fn self_import_is_reported_individually() {
        let ws = Workspace::new()
            .package("app", "app", &[])
            .file("app/a.ts", &[("./a", Static)]);
        let diags = run(&CircularImports::new(), ws, &Config::default());
        assert_eq!(files(&diags), vec!["AG002 `app/a.ts` imports itself via `./a`"]);
    }

    #[test]
    fn acyclic_graph_is_clean() {
        let ws = Workspace::new()
            .package("app", "app", &[])
            .file("app/a.ts", &[("./b", Static), ("react", Static)])
            .file("app/b.ts", &[("./c", Static)])
            .file("app/c.ts", &[]);
        assert!(run(&CircularImports::new(), ws, &Config::default()).is_empty());
    }

    #[test]
    fn package_granularity_collapses_files() {
        let config = Config::parse("[cycles]\ngranularity = \"package\"\n").unwrap();
        let ws = Workspace::new()
            .package("core", "packages/core", &[])
            .package("shared", "packages/shared", &[])
            .file("packages/core/a.ts", &[("shared/x", Static)])
            .file("packages/core/b.ts", &[("./a", Static)])
            .file("packages/shared/x.ts", &[("../core/b", Static)]);
        let diags = run(&CircularImports::new(), ws, &config);

        assert_eq!(files(&diags), vec!["AG001 circular import: core -> shared -> core"]);
        let evidence: Vec<String> = diags[0]
            .evidence
            .iter()
            .map(|l| l.location.to_string())
            .collect();
        assert_eq!(evidence, vec!["packages/core/a.ts:1:1", "packages/shared/x.ts:1:1"]);
    }

    #[test]
    fn file_cycle_inside_one_package_is_not_a_package_cycle() {
        let config = Config::parse("[cycles]\ngranularity = \"package\"\n").unwrap();
        let ws = Workspace::new()
            .package("core", "packages/core", &[])
            .file("packages/core/a.ts", &[("./b", Static)])
            .file("packages/core/b.ts", &[("./a", Static)]);
        assert!(run(&CircularImports::new(), ws, &config).is_empty());
    }

    #[test]
    fn shortest_cycle_on_plain_adjacency() {
        let n = NodeIndex::new;
        let adjacency = |i: NodeIndex| match i.index() {
            0 => vec![n(1)],
            1 => vec![n(2), n(0)],
            _ => vec![n(0)],
        };
        assert_eq!(shortest_cycle(n(0), adjacency), Some(vec![n(0), n(1)]));
        assert_eq!(shortest_cycle(n(0), |_| Vec::new()), None);
    }
}
