//! # archgraph-ts
//!
//! Tree-sitter based module parser for TypeScript and JavaScript.
//!
//! [`TypeScriptParser`] implements [`archgraph_core::ModuleParser`] for every
//! extension in [`archgraph_core::config::SOURCE_EXTENSIONS`]. It extracts
//! raw import specifiers (static, type-only, dynamic, re-export) and the
//! exported names of a file without evaluating any code.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod typescript;

pub use typescript::TypeScriptParser;
