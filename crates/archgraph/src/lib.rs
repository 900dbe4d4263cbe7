//! # archgraph
//!
//! Dependency and architecture analyzer for TypeScript/JavaScript workspaces.
//!
//! This is the facade crate: it re-exports the core pipeline, the built-in
//! analyzers and the TypeScript parser, and wires them together.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let report = archgraph::check("./my-monorepo")?;
//! for diagnostic in &report.diagnostics {
//!     println!("{diagnostic}");
//! }
//! ```
//!
//! `check` reads `archgraph.toml` (or `.archgraph.toml`) from the workspace
//! root when present.
//!
//! ## Programmatic Usage
//!
//! ```rust,ignore
//! use archgraph::Config;
//!
//! let report = archgraph::builder()
//!     .root("./my-monorepo")
//!     .config(Config::parse("[analyzer]\nconcurrency = 4\n")?)
//!     .build()?
//!     .run()?;
//! ```

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

// Re-export core types and traits
pub use archgraph_core::*;

pub use archgraph_ts::TypeScriptParser;

/// Built-in analyzers.
pub mod rules {
    pub use archgraph_rules::*;
}

/// Config file names looked up in the workspace root, in priority order.
pub const CONFIG_CANDIDATES: &[&str] = &["archgraph.toml", ".archgraph.toml"];

/// Errors from [`check`].
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The workspace config file is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The run itself failed.
    #[error(transparent)]
    Run(#[from] RunError),
}

/// A scheduler builder with the TypeScript parser and every built-in
/// analyzer registered.
#[must_use]
pub fn builder() -> SchedulerBuilder {
    Scheduler::builder()
        .parser(TypeScriptParser::new())
        .analyzers(rules::all_analyzers())
}

/// Loads the config file found in `root`, or defaults when there is none.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be loaded.
pub fn load_config(root: &Path) -> Result<Config, ConfigError> {
    match find_config(root) {
        Some(path) => {
            tracing::debug!("Using config: {}", path.display());
            Config::from_file(&path)
        }
        None => Ok(Config::default()),
    }
}

/// Analyzes the workspace at `root` with its own config file.
///
/// # Errors
///
/// Returns an error if the config is invalid or the run fails.
pub fn check(root: impl AsRef<Path>) -> Result<AnalysisReport, CheckError> {
    let root = root.as_ref();
    let config = load_config(root)?;
    let report = builder().root(root).config(config).build()?.run()?;
    Ok(report)
}

fn find_config(root: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn builder_registers_every_analyzer() {
        let tmp = TempDir::new().unwrap();
        let scheduler = builder().root(tmp.path()).build().unwrap();
        let names: Vec<&str> = scheduler.analyzers().iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec!["circular-imports", "layer-boundaries", "dependency-usage"]
        );
    }

    #[test]
    fn config_lookup_prefers_plain_name() {
        let tmp = TempDir::new().unwrap();
        assert!(find_config(tmp.path()).is_none());

        fs::write(tmp.path().join(".archgraph.toml"), "").unwrap();
        assert_eq!(
            find_config(tmp.path()),
            Some(tmp.path().join(".archgraph.toml"))
        );

        fs::write(tmp.path().join("archgraph.toml"), "").unwrap();
        assert_eq!(
            find_config(tmp.path()),
            Some(tmp.path().join("archgraph.toml"))
        );
    }

    #[test]
    fn invalid_config_is_reported() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("archgraph.toml"), "[analyzer]\nbogus = 1\n").unwrap();
        assert!(matches!(check(tmp.path()), Err(CheckError::Config(_))));
    }
}
