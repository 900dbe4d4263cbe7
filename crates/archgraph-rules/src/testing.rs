//! In-memory workspaces for analyzer tests.

use std::collections::{BTreeMap, BTreeSet};

use archgraph_core::graph::{GraphBuilder, ParsedFile};
use archgraph_core::parser::{Exports, ParseOutcome};
use archgraph_core::scanner::PackageRoot;
use archgraph_core::{
    AnalysisContext, Config, Diagnostic, GraphAnalyzer, ImportGraph, ImportKind, ParsedModule,
    RawImport,
};

pub(crate) use ImportKind::{Dynamic, ReExport, Static, TypeOnly};

#[derive(Default)]
pub(crate) struct Workspace {
    packages: Vec<PackageRoot>,
    files: Vec<(String, Vec<(String, ImportKind)>, bool)>,
}

impl Workspace {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a package whose manifest lists `deps`, one per line from line 3.
    pub(crate) fn package(mut self, name: &str, root: &str, deps: &[&str]) -> Self {
        let manifest = if root.is_empty() {
            "package.json".to_string()
        } else {
            format!("{root}/package.json")
        };
        self.packages.push(PackageRoot {
            name: name.to_string(),
            root: root.to_string(),
            manifest,
            declared: Some(deps.iter().map(|d| (*d).to_string()).collect::<BTreeSet<_>>()),
            dependency_lines: deps
                .iter()
                .enumerate()
                .map(|(i, d)| ((*d).to_string(), i + 3))
                .collect::<BTreeMap<_, _>>(),
            entry_points: Vec::new(),
            manifest_hash: format!("manifest:{name}"),
        });
        self
    }

    /// Adds a package whose manifest could not be read.
    pub(crate) fn broken_package(mut self, name: &str, root: &str) -> Self {
        self = self.package(name, root, &[]);
        if let Some(p) = self.packages.last_mut() {
            p.declared = None;
        }
        self
    }

    /// Adds a file; import `i` sits on line `i + 1`.
    pub(crate) fn file(mut self, path: &str, imports: &[(&str, ImportKind)]) -> Self {
        self.files.push((path.to_string(), owned(imports), false));
        self
    }

    /// Adds a re-export-only file.
    pub(crate) fn barrel(mut self, path: &str, imports: &[(&str, ImportKind)]) -> Self {
        self.files.push((path.to_string(), owned(imports), true));
        self
    }

    pub(crate) fn build(mut self, config: &Config) -> ImportGraph {
        self.packages.sort_by(|a, b| a.root.cmp(&b.root));
        self.files.sort_by(|a, b| a.0.cmp(&b.0));
        let packages = &self.packages;
        let files = self
            .files
            .into_iter()
            .map(|(path, imports, reexport_only)| ParsedFile {
                package: owner(packages, &path),
                content_hash: format!("content:{path}"),
                outcome: ParseOutcome::Parsed(ParsedModule {
                    imports: imports
                        .into_iter()
                        .enumerate()
                        .map(|(i, (spec, kind))| RawImport::new(spec, kind, i + 1, 1))
                        .collect(),
                    exports: Exports::default(),
                    reexport_only,
                }),
                path,
            })
            .collect();
        GraphBuilder::new(packages, config).build(files).0
    }
}

fn owned(imports: &[(&str, ImportKind)]) -> Vec<(String, ImportKind)> {
    imports.iter().map(|(s, k)| ((*s).to_string(), *k)).collect()
}

/// Longest-prefix owning package.
fn owner(packages: &[PackageRoot], path: &str) -> usize {
    packages
        .iter()
        .enumerate()
        .filter(|(_, p)| p.root.is_empty() || path.starts_with(&format!("{}/", p.root)))
        .max_by_key(|(_, p)| p.root.len())
        .map_or(0, |(i, _)| i)
}

pub(crate) fn run(
    analyzer: &dyn GraphAnalyzer,
    workspace: Workspace,
    config: &Config,
) -> Vec<Diagnostic> {
    let graph = workspace.build(config);
    let mut out = analyzer.analyze(&AnalysisContext::new(&graph, config));
    archgraph_core::sort_diagnostics(&mut out);
    out
}
