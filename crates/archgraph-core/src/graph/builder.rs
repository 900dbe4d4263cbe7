//! Assembles parse results into an [`ImportGraph`].

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use super::resolve::{Resolution, Resolver};
use super::{ExternalNode, ImportEdge, ImportGraph, ModuleNode, Node, PackageUnit};
use crate::cache::Fingerprint;
use crate::config::Config;
use crate::parser::{ParseOutcome, ParsedModule};
use crate::scanner::PackageRoot;
use crate::types::{Category, Diagnostic, Location, Severity};

/// Code for a file that could not be parsed.
pub const PARSE_ERROR: &str = "AG301";
/// Code for a specifier that resolved to nothing.
pub const UNRESOLVED_IMPORT: &str = "AG203";

/// One scanned file with its parse outcome.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Canonical path.
    pub path: String,
    /// Owning package index.
    pub package: usize,
    /// Hash of the normalized content.
    pub content_hash: String,
    /// Parse outcome.
    pub outcome: ParseOutcome,
}

/// Builds the graph. Single-threaded: resolution needs the complete node set.
pub struct GraphBuilder<'a> {
    packages: &'a [PackageRoot],
    config: &'a Config,
}

impl<'a> GraphBuilder<'a> {
    /// Creates a builder over the scanned packages.
    #[must_use]
    pub fn new(packages: &'a [PackageRoot], config: &'a Config) -> Self {
        Self { packages, config }
    }

    /// Builds the graph from files in scan order.
    ///
    /// Returns the graph plus parse-error and unresolved-import diagnostics.
    #[must_use]
    pub fn build(&self, files: Vec<ParsedFile>) -> (ImportGraph, Vec<Diagnostic>) {
        let mut graph: DiGraph<Node, ImportEdge> = DiGraph::new();
        let mut by_path = HashMap::with_capacity(files.len());
        let mut diagnostics = Vec::new();
        let mut parsed: Vec<Option<ParsedModule>> = Vec::with_capacity(files.len());

        let mut fingerprint = Fingerprint::new("graph");
        for package in self.packages {
            fingerprint.push(&package.name);
            fingerprint.push(&package.root);
            fingerprint.push(&package.manifest_hash);
        }

        for file in files {
            fingerprint.push(&file.path);
            fingerprint.push(file.package.to_le_bytes());
            fingerprint.push(&file.content_hash);

            let (module, exports, reexport_only) = match file.outcome {
                ParseOutcome::Parsed(module) => {
                    let exports = module.exports.clone();
                    let reexport_only = module.reexport_only;
                    (Some(module), exports, reexport_only)
                }
                ParseOutcome::Failed(err) => {
                    diagnostics.push(
                        Diagnostic::new(
                            PARSE_ERROR,
                            "parse-error",
                            Category::Configuration,
                            Severity::Warning,
                            Location::new(&file.path, err.line(), 0),
                            format!("cannot parse `{}`: {err}", file.path),
                        )
                        .with_help("the file is analyzed as if it had no imports"),
                    );
                    (None, crate::parser::Exports::Unknown, false)
                }
            };
            let layer = self.config.layers.assign(&file.path).map(str::to_string);
            let idx = graph.add_node(Node::Module(ModuleNode {
                path: file.path.clone(),
                package: file.package,
                layer,
                exports,
                content_hash: file.content_hash,
                reexport_only,
            }));
            by_path.insert(file.path, idx);
            parsed.push(module);
        }
        let module_count = graph.node_count();

        let resolver = Resolver::new(by_path.keys().map(String::as_str), self.packages);
        let mut externals: HashMap<String, NodeIndex> = HashMap::new();
        let mut pending = Vec::new();
        for (i, module) in parsed.iter().enumerate() {
            let Some(module) = module else { continue };
            let from = NodeIndex::new(i);
            let from_path = match &graph[from] {
                Node::Module(m) => m.path.clone(),
                Node::External(_) => continue,
            };
            for import in &module.imports {
                let edge = ImportEdge {
                    specifier: import.specifier.clone(),
                    kind: import.kind,
                    line: import.line,
                    column: import.column,
                };
                match resolver.resolve(&from_path, &import.specifier) {
                    Resolution::Module(target) => {
                        if let Some(&to) = by_path.get(&target) {
                            pending.push((from, to, edge));
                        }
                    }
                    Resolution::External { name, origin } => {
                        let to = *externals.entry(name.clone()).or_insert_with(|| {
                            graph.add_node(Node::External(ExternalNode { name, origin }))
                        });
                        pending.push((from, to, edge));
                    }
                    Resolution::Unresolved => {
                        debug!(
                            file = %from_path,
                            specifier = %import.specifier,
                            "unresolved import"
                        );
                        diagnostics.push(
                            Diagnostic::new(
                                UNRESOLVED_IMPORT,
                                "unresolved-import",
                                Category::Dependency,
                                self.config.dependencies.unresolved_severity,
                                Location::new(&from_path, import.line, import.column),
                                format!("cannot resolve `{}`", import.specifier),
                            )
                            .with_help("check the path, or add the package to the workspace"),
                        );
                    }
                }
            }
        }
        for (from, to, edge) in pending {
            graph.add_edge(from, to, edge);
        }

        let mut packages: Vec<PackageUnit> = self
            .packages
            .iter()
            .map(|p| PackageUnit {
                name: p.name.clone(),
                root: p.root.clone(),
                manifest: p.manifest.clone(),
                declared: p.declared.clone(),
                dependency_lines: p.dependency_lines.clone(),
                manifest_hash: p.manifest_hash.clone(),
                modules: Vec::new(),
            })
            .collect();
        for i in 0..module_count {
            let idx = NodeIndex::new(i);
            if let Some(m) = graph[idx].as_module() {
                if let Some(p) = packages.get_mut(m.package) {
                    p.modules.push(idx);
                }
            }
        }

        debug!(
            modules = module_count,
            edges = graph.edge_count(),
            externals = externals.len(),
            "graph built"
        );
        let graph = ImportGraph {
            graph,
            packages,
            module_count,
            by_path,
            fingerprint: fingerprint.finish().into_hex(),
        };
        (graph, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Exports, ImportKind, ParseError, RawImport};
    use std::collections::{BTreeMap, BTreeSet};

    fn package(name: &str, root: &str) -> PackageRoot {
        PackageRoot {
            name: name.to_string(),
            root: root.to_string(),
            manifest: format!("{root}/package.json"),
            declared: Some(BTreeSet::new()),
            dependency_lines: BTreeMap::new(),
            entry_points: Vec::new(),
            manifest_hash: "m".into(),
        }
    }

    fn file(path: &str, package: usize, imports: &[(&str, ImportKind)]) -> ParsedFile {
        ParsedFile {
            path: path.to_string(),
            package,
            content_hash: format!("hash:{path}"),
            outcome: ParseOutcome::Parsed(ParsedModule {
                imports: imports
                    .iter()
                    .enumerate()
                    .map(|(i, (s, k))| RawImport::new(*s, *k, i + 1, 1))
                    .collect(),
                exports: Exports::default(),
                reexport_only: false,
            }),
        }
    }

    #[test]
    fn builds_edges_in_source_order_with_forward_references() {
        let packages = vec![package("a", "pkg/a")];
        let config = Config::default();
        let (graph, diags) = GraphBuilder::new(&packages, &config).build(vec![
            file(
                "pkg/a/x.ts",
                0,
                &[
                    ("./y", ImportKind::Static),
                    ("lodash", ImportKind::Static),
                    ("./z", ImportKind::TypeOnly),
                ],
            ),
            file("pkg/a/y.ts", 0, &[("./x", ImportKind::Dynamic)]),
            file("pkg/a/z.ts", 0, &[]),
        ]);
        assert!(diags.is_empty());
        assert_eq!(graph.module_count(), 3);
        assert_eq!(graph.edge_count(), 4);

        let x = graph.module_by_path("pkg/a/x.ts").unwrap();
        let targets: Vec<&str> = graph.outgoing(x).iter().map(|e| graph.label(e.to)).collect();
        assert_eq!(targets, vec!["pkg/a/y.ts", "lodash", "pkg/a/z.ts"]);
        assert_eq!(graph.packages()[0].modules.len(), 3);
    }

    #[test]
    fn unresolved_and_parse_failures_become_diagnostics() {
        let packages = vec![package("a", "pkg/a")];
        let config = Config::default();
        let broken = ParsedFile {
            path: "pkg/a/broken.ts".into(),
            package: 0,
            content_hash: "h".into(),
            outcome: ParseOutcome::Failed(ParseError::Syntax { line: 4, column: 2 }),
        };
        let (graph, diags) = GraphBuilder::new(&packages, &config)
            .build(vec![broken, file("pkg/a/x.ts", 0, &[("./nope", ImportKind::Static)])]);

        assert_eq!(graph.edge_count(), 0);
        let codes: Vec<&str> = diags.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec![PARSE_ERROR, UNRESOLVED_IMPORT]);
        assert_eq!(diags[0].location.line, 4);
        assert_eq!(diags[1].severity, Severity::Warning);
    }

    #[test]
    fn layers_assigned_during_build() {
        let packages = vec![package("a", "pkg/a")];
        let config = Config::parse(
            "[[layers]]\nname = \"core\"\npaths = [\"pkg/a/core/**\"]\n",
        )
        .unwrap();
        let (graph, _) = GraphBuilder::new(&packages, &config).build(vec![
            file("pkg/a/core/m.ts", 0, &[]),
            file("pkg/a/other.ts", 0, &[]),
        ]);
        let layers: Vec<Option<&str>> = graph.modules().map(|(_, m)| m.layer.as_deref()).collect();
        assert_eq!(layers, vec![Some("core"), None]);
    }

    #[test]
    fn package_view_collapses_cross_package_edges() {
        let packages = vec![package("a", "pkg/a"), package("b", "pkg/b")];
        let config = Config::default();
        let (graph, _) = GraphBuilder::new(&packages, &config).build(vec![
            file("pkg/a/x.ts", 0, &[("../b/y", ImportKind::Static), ("./z", ImportKind::Static)]),
            file("pkg/a/z.ts", 0, &[("../b/y", ImportKind::Static)]),
            file("pkg/b/y.ts", 1, &[]),
        ]);
        let view = graph.package_view();
        assert_eq!(view.inner().edge_count(), 1);
        let realizing = view.realizing(NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        assert_eq!(realizing.len(), 2);
        assert!(view.realizing(NodeIndex::new(1), NodeIndex::new(0)).is_none());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let packages = vec![package("a", "pkg/a")];
        let config = Config::default();
        let build = |hash: &str| {
            let mut f = file("pkg/a/x.ts", 0, &[]);
            f.content_hash = hash.to_string();
            GraphBuilder::new(&packages, &config)
                .build(vec![f])
                .0
                .fingerprint()
                .to_string()
        };
        assert_eq!(build("one"), build("one"));
        assert_ne!(build("one"), build("two"));
    }
}
