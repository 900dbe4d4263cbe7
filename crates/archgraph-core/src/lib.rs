//! # archgraph-core
//!
//! Core of a workspace dependency and architecture analyzer.
//!
//! A run scans a multi-package source tree, parses every module in
//! parallel, assembles a directed import graph, and hands the finished graph
//! to a set of [`GraphAnalyzer`]s. This crate provides:
//!
//! - [`Config`] and its validating TOML loader
//! - [`Scanner`] for file and package discovery
//! - [`ModuleParser`], the per-language extension point
//! - [`ImportGraph`] and its builder/resolver
//! - [`CacheStore`] with disk and in-memory stores
//! - [`Scheduler`] for orchestration on a bounded worker pool
//!
//! ## Example
//!
//! ```ignore
//! use archgraph_core::{Config, Scheduler};
//!
//! let scheduler = Scheduler::builder()
//!     .root("./my-monorepo")
//!     .config(Config::from_file("archgraph.toml".as_ref())?)
//!     .parser(MyParser)
//!     .analyzer(MyAnalyzer)
//!     .build()?;
//!
//! let report = scheduler.run()?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod analyzer;
pub mod cache;
pub mod config;
mod context;
pub mod graph;
pub mod parser;
pub mod scanner;
mod scheduler;
mod types;

/// Shared helpers.
pub mod utils;

pub use analyzer::{AnalyzerBox, GraphAnalyzer};
pub use cache::{CacheStore, DiskCache, MemoryCache};
pub use config::{Config, ConfigError};
pub use context::AnalysisContext;
pub use graph::{ImportGraph, ModuleNode, PackageUnit};
pub use parser::{ImportKind, ModuleParser, ParseError, ParsedModule, ParserBox, RawImport};
pub use scanner::{ScanError, Scanner};
pub use scheduler::{CancelToken, RunError, Scheduler, SchedulerBuilder};
pub use types::{
    sort_diagnostics, AnalysisReport, Category, Diagnostic, Label, Location, RunSummary,
    Severity, SeverityCounts,
};
