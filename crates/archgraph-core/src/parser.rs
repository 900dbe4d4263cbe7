//! Module parser interface.
//!
//! A parser turns one file's text into raw import records and declared
//! exports. It never touches the filesystem; specifier resolution happens in
//! the graph builder.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// How a module refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    /// `import … from "x"`, `import "x"`, `require("x")`.
    Static,
    /// `import type … from "x"`; erased at runtime.
    TypeOnly,
    /// `import("x")`.
    Dynamic,
    /// `export … from "x"`.
    ReExport,
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::TypeOnly => write!(f, "type-only"),
            Self::Dynamic => write!(f, "dynamic"),
            Self::ReExport => write!(f, "re-export"),
        }
    }
}

/// An unresolved import record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImport {
    /// Specifier text as written (e.g., `"./util"`, `"lodash/fp"`).
    pub specifier: String,
    /// Import kind.
    pub kind: ImportKind,
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

impl RawImport {
    /// Creates a new import record.
    #[must_use]
    pub fn new(specifier: impl Into<String>, kind: ImportKind, line: usize, column: usize) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            line,
            column,
        }
    }
}

/// Declared exports of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "names")]
pub enum Exports {
    /// Exact set of exported names.
    Known(BTreeSet<String>),
    /// Not statically determinable (e.g., `export * from`).
    Unknown,
}

impl Default for Exports {
    fn default() -> Self {
        Self::Known(BTreeSet::new())
    }
}

impl Exports {
    /// Adds a name; no-op once the set is unknown.
    pub fn insert(&mut self, name: impl Into<String>) {
        if let Self::Known(names) = self {
            names.insert(name.into());
        }
    }

    /// Marks the set as not statically determinable.
    pub fn mark_unknown(&mut self) {
        *self = Self::Unknown;
    }
}

/// Parse result for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedModule {
    /// Imports in source order.
    pub imports: Vec<RawImport>,
    /// Declared exports.
    pub exports: Exports,
    /// Every top-level statement is an `export … from` (a barrel file).
    pub reexport_only: bool,
}

/// Why a file could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum ParseError {
    /// Source contains syntax the parser could not recover from.
    #[error("syntax error at {line}:{column}")]
    Syntax {
        /// Line of the first error (1-indexed).
        line: usize,
        /// Column of the first error (1-indexed).
        column: usize,
    },

    /// Content is not valid UTF-8.
    #[error("file is not valid UTF-8")]
    Encoding,

    /// The file could not be read.
    #[error("file could not be read: {message}")]
    Unreadable {
        /// IO error text.
        message: String,
    },

    /// The parser itself failed (e.g., grammar could not be loaded).
    #[error("parser failure: {message}")]
    Internal {
        /// Failure detail.
        message: String,
    },
}

impl ParseError {
    /// Line the error points at, 0 when it concerns the whole file.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Syntax { line, .. } => *line,
            _ => 0,
        }
    }
}

/// Outcome of parsing a file; failures are data, not aborts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseOutcome {
    /// The file parsed.
    Parsed(ParsedModule),
    /// The file could not be parsed; it contributes zero edges.
    Failed(ParseError),
}

/// Extracts imports and exports from source text.
///
/// Implement this to add support for a new source language.
pub trait ModuleParser: Send + Sync {
    /// Parser identifier (e.g., `"typescript"`). Part of every parse cache key.
    fn id(&self) -> &'static str;

    /// Parser version marker. Bump to invalidate cached parse results.
    fn version(&self) -> &'static str;

    /// File extensions this parser handles, without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Parses normalized source text.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the source cannot be parsed.
    fn parse(&self, path: &Path, source: &str) -> Result<ParsedModule, ParseError>;
}

/// Boxed parser for dynamic dispatch.
pub type ParserBox = Box<dyn ModuleParser>;

/// Strips a leading byte-order mark and converts CRLF line endings to LF.
#[must_use]
pub fn normalize_source(source: &str) -> String {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    source.replace("\r\n", "\n")
}

/// Decodes and normalizes raw file bytes.
///
/// # Errors
///
/// Returns [`ParseError::Encoding`] for non-UTF-8 content.
pub fn decode_source(bytes: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(bytes)
        .map(normalize_source)
        .map_err(|_| ParseError::Encoding)
}
