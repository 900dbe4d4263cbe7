//! Context handed to graph analyzers.

use crate::config::Config;
use crate::graph::ImportGraph;

/// Read-only inputs of one analysis pass.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    /// The finished import graph.
    pub graph: &'a ImportGraph,
    /// Validated configuration.
    pub config: &'a Config,
    /// Root-relative config file path, used to locate configuration findings.
    pub config_label: &'a str,
}

impl<'a> AnalysisContext<'a> {
    /// Creates a new context labelled `archgraph.toml`.
    #[must_use]
    pub fn new(graph: &'a ImportGraph, config: &'a Config) -> Self {
        Self {
            graph,
            config,
            config_label: "archgraph.toml",
        }
    }

    /// Sets the config file label.
    #[must_use]
    pub fn with_config_label(mut self, label: &'a str) -> Self {
        self.config_label = label;
        self
    }
}
