//! Import graph: module and external nodes joined by import edges.
//!
//! Module nodes occupy indices `0..module_count` in scan order, so iterating
//! node indices visits modules in the stable input order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::parser::{Exports, ImportKind};

mod builder;
pub mod resolve;

pub use builder::{GraphBuilder, ParsedFile, PARSE_ERROR, UNRESOLVED_IMPORT};

/// One source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNode {
    /// Canonical root-relative path; the node identity.
    pub path: String,
    /// Index of the owning package.
    pub package: usize,
    /// Assigned layer; `None` when unassigned.
    pub layer: Option<String>,
    /// Declared exports.
    pub exports: Exports,
    /// Hash of the normalized content.
    pub content_hash: String,
    /// Every top-level statement is an `export … from`.
    pub reexport_only: bool,
}

/// Where an external dependency comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExternalOrigin {
    /// A registry package (e.g., `lodash`).
    Registry,
    /// A runtime built-in (e.g., `fs`, `node:path`).
    Builtin,
    /// A workspace package whose target file could not be located.
    Workspace,
}

/// A dependency outside the analyzed file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalNode {
    /// Package name (`lodash`, `@scope/pkg`, `fs`).
    pub name: String,
    /// Origin of the dependency.
    pub origin: ExternalOrigin,
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A source file.
    Module(ModuleNode),
    /// An external pseudo-node; never has outgoing edges.
    External(ExternalNode),
}

impl Node {
    /// Returns the module, if this is one.
    #[must_use]
    pub fn as_module(&self) -> Option<&ModuleNode> {
        match self {
            Self::Module(m) => Some(m),
            Self::External(_) => None,
        }
    }

    /// Returns the external dependency, if this is one.
    #[must_use]
    pub fn as_external(&self) -> Option<&ExternalNode> {
        match self {
            Self::External(e) => Some(e),
            Self::Module(_) => None,
        }
    }
}

/// A resolved import. Endpoints are the graph edge's endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEdge {
    /// Specifier text as written.
    pub specifier: String,
    /// Import kind.
    pub kind: ImportKind,
    /// Line in the importing file.
    pub line: usize,
    /// Column in the importing file.
    pub column: usize,
}

impl ImportEdge {
    /// Returns true for specifiers naming a package rather than a path.
    #[must_use]
    pub fn is_bare(&self) -> bool {
        resolve::is_bare(&self.specifier)
    }
}

/// A package and the modules it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUnit {
    /// Package name.
    pub name: String,
    /// Canonical root directory (`""` for the workspace root).
    pub root: String,
    /// Canonical manifest path.
    pub manifest: String,
    /// Declared dependency names; `None` when the manifest was unusable.
    pub declared: Option<BTreeSet<String>>,
    /// Manifest line of each declared dependency.
    pub dependency_lines: BTreeMap<String, usize>,
    /// Hash of the manifest bytes.
    pub manifest_hash: String,
    /// Owned modules in scan order.
    pub modules: Vec<NodeIndex>,
}

/// A file-level edge viewed from its source.
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'g> {
    /// Edge id.
    pub id: EdgeIndex,
    /// Importing module.
    pub from: NodeIndex,
    /// Imported node.
    pub to: NodeIndex,
    /// Edge data.
    pub edge: &'g ImportEdge,
}

/// The assembled, immutable import graph.
#[derive(Debug, Default)]
pub struct ImportGraph {
    graph: DiGraph<Node, ImportEdge>,
    packages: Vec<PackageUnit>,
    module_count: usize,
    by_path: HashMap<String, NodeIndex>,
    fingerprint: String,
}

impl ImportGraph {
    /// Underlying petgraph graph.
    #[must_use]
    pub fn inner(&self) -> &DiGraph<Node, ImportEdge> {
        &self.graph
    }

    /// Number of module nodes.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.module_count
    }

    /// Number of edges, external ones included.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Modules in scan order.
    pub fn modules(&self) -> impl Iterator<Item = (NodeIndex, &ModuleNode)> {
        (0..self.module_count).filter_map(move |i| {
            let idx = NodeIndex::new(i);
            self.graph[idx].as_module().map(|m| (idx, m))
        })
    }

    /// Node by index.
    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    /// Module by index; `None` for external nodes.
    #[must_use]
    pub fn module(&self, idx: NodeIndex) -> Option<&ModuleNode> {
        self.graph.node_weight(idx).and_then(Node::as_module)
    }

    /// Module index by canonical path.
    #[must_use]
    pub fn module_by_path(&self, path: &str) -> Option<NodeIndex> {
        self.by_path.get(path).copied()
    }

    /// Canonical path of a module, or the name of an external node.
    #[must_use]
    pub fn label(&self, idx: NodeIndex) -> &str {
        match &self.graph[idx] {
            Node::Module(m) => &m.path,
            Node::External(e) => &e.name,
        }
    }

    /// Outgoing edges of a node in insertion (source) order.
    #[must_use]
    pub fn outgoing(&self, from: NodeIndex) -> Vec<EdgeView<'_>> {
        let mut edges: Vec<EdgeView<'_>> = self
            .graph
            .edges(from)
            .map(|e| EdgeView {
                id: e.id(),
                from,
                to: e.target(),
                edge: e.weight(),
            })
            .collect();
        edges.sort_by_key(|e| e.id);
        edges
    }

    /// A single edge by id.
    #[must_use]
    pub fn edge(&self, id: EdgeIndex) -> Option<EdgeView<'_>> {
        let (from, to) = self.graph.edge_endpoints(id)?;
        let edge = self.graph.edge_weight(id)?;
        Some(EdgeView { id, from, to, edge })
    }

    /// Every edge in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeView<'_>> {
        self.graph.edge_references().map(|e| EdgeView {
            id: e.id(),
            from: e.source(),
            to: e.target(),
            edge: e.weight(),
        })
    }

    /// Packages sorted by root directory.
    #[must_use]
    pub fn packages(&self) -> &[PackageUnit] {
        &self.packages
    }

    /// Owning package of a module.
    #[must_use]
    pub fn package_of(&self, idx: NodeIndex) -> Option<&PackageUnit> {
        self.module(idx).and_then(|m| self.packages.get(m.package))
    }

    /// Hash of every module path, package and content hash, plus every
    /// package manifest. Two graphs with equal fingerprints have equal edges.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Collapses the module graph to packages.
    ///
    /// An edge `P → Q` exists iff some module edge crosses from `P` to `Q`;
    /// it keeps every realizing file edge in insertion order.
    #[must_use]
    pub fn package_view(&self) -> PackageGraph {
        let mut graph = DiGraph::with_capacity(self.packages.len(), 0);
        for i in 0..self.packages.len() {
            graph.add_node(i);
        }
        let mut index: HashMap<(usize, usize), EdgeIndex> = HashMap::new();
        for view in self.edges() {
            let (Some(from), Some(to)) = (self.module(view.from), self.module(view.to)) else {
                continue;
            };
            if from.package == to.package {
                continue;
            }
            let id = *index.entry((from.package, to.package)).or_insert_with(|| {
                graph.add_edge(
                    NodeIndex::new(from.package),
                    NodeIndex::new(to.package),
                    Vec::new(),
                )
            });
            graph[id].push(view.id);
        }
        PackageGraph { graph }
    }
}

/// Package-level view: node weight is the package index, edge weight the
/// realizing module edges.
#[derive(Debug)]
pub struct PackageGraph {
    graph: DiGraph<usize, Vec<EdgeIndex>>,
}

impl PackageGraph {
    /// Underlying petgraph graph. Node `i` is package `i`.
    #[must_use]
    pub fn inner(&self) -> &DiGraph<usize, Vec<EdgeIndex>> {
        &self.graph
    }

    /// Realizing module edges of `from → to`, if the packages are connected.
    #[must_use]
    pub fn realizing(&self, from: NodeIndex, to: NodeIndex) -> Option<&[EdgeIndex]> {
        self.graph
            .find_edge(from, to)
            .map(|e| self.graph[e].as_slice())
    }
}
