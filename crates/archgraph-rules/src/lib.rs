//! # archgraph-rules
//!
//! Built-in graph analyzers for archgraph.
//!
//! ## Available Analyzers
//!
//! | Codes | Name | Description |
//! |-------|------|-------------|
//! | AG001, AG002 | `circular-imports` | Import cycles and self imports |
//! | AG101, AG102 | `layer-boundaries` | Forbidden cross-layer imports, cyclic `allow` lists |
//! | AG201, AG202 | `dependency-usage` | Unused and missing `package.json` dependencies |
//!
//! ## Usage
//!
//! ```ignore
//! use archgraph_core::Scheduler;
//! use archgraph_rules::all_analyzers;
//!
//! let scheduler = Scheduler::builder()
//!     .root("./")
//!     .parser(MyParser)
//!     .analyzers(all_analyzers())
//!     .build()?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circular_import;
pub mod dependency_usage;
pub mod layer_boundaries;
mod presets;

#[cfg(test)]
mod testing;

pub use circular_import::CircularImports;
pub use dependency_usage::DependencyUsage;
pub use layer_boundaries::LayerBoundaries;
pub use presets::all_analyzers;

/// Re-export core types for convenience.
pub use archgraph_core::{Diagnostic, GraphAnalyzer, Severity};
