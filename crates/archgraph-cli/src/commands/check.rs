//! Check command implementation.

use std::num::NonZeroUsize;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use archgraph_core::Scheduler;
use archgraph_rules::all_analyzers;
use archgraph_ts::TypeScriptParser;

use crate::config_resolver;
use crate::OutputFormat;

/// Command-line settings layered over the configuration file.
#[derive(Debug, Clone, Copy)]
pub struct Overrides {
    /// Output format.
    pub format: OutputFormat,
    /// Worker pool size.
    pub concurrency: Option<NonZeroUsize>,
    /// Disable the cache for this run.
    pub no_cache: bool,
}

/// Runs the check command. Exits 1 when any error-severity diagnostic remains.
pub fn run(
    path: Option<&Path>,
    config_path: Option<&Path>,
    overrides: &Overrides,
) -> Result<ExitCode> {
    let source = config_resolver::resolve(path.unwrap_or_else(|| Path::new(".")), config_path);
    let mut config = source.load()?;
    if let Some(n) = overrides.concurrency {
        config.analyzer.concurrency = n.get();
    }
    if overrides.no_cache {
        config.cache.enabled = false;
    }
    let root = source.workspace_root(path, &config);

    let scheduler = Scheduler::builder()
        .root(&root)
        .config(config)
        .parser(TypeScriptParser::new())
        .analyzers(all_analyzers())
        .build()?;

    tracing::info!(
        "Analyzing {} with {} analyzers",
        scheduler.root().display(),
        scheduler.analyzers().len()
    );

    let report = scheduler.run()?;
    super::output::print(&report, overrides.format)?;

    Ok(if report.has_errors() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
