//! archgraph CLI tool.
//!
//! Usage:
//! ```bash
//! archgraph check [OPTIONS] [PATH]
//! archgraph list-analyzers
//! archgraph init [PATH]
//! archgraph clean-cache [PATH]
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Dependency and architecture analyzer for TypeScript/JavaScript workspaces
#[derive(Parser)]
#[command(name = "archgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "ARCHGRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a workspace
    Check {
        /// Workspace root (default: from the config file, else the current directory)
        path: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Worker pool size (overrides analyzer.concurrency)
        #[arg(short = 'j', long)]
        concurrency: Option<NonZeroUsize>,

        /// Run without reading or writing the cache
        #[arg(long)]
        no_cache: bool,
    },

    /// List available analyzers
    ListAnalyzers,

    /// Initialize configuration file
    Init {
        /// Directory to write archgraph.toml into
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Delete the analysis cache
    CleanCache {
        /// Workspace root (default: from the config file, else the current directory)
        path: Option<PathBuf>,
    },
}

/// Output format for analysis results.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-diagnostic compact format.
    Compact,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Check {
            path,
            format,
            concurrency,
            no_cache,
        } => commands::check::run(
            path.as_deref(),
            config,
            &commands::check::Overrides {
                format,
                concurrency,
                no_cache,
            },
        ),
        Commands::ListAnalyzers => {
            commands::list_analyzers::run();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { path, force } => {
            commands::init::run(&path, force).map(|()| ExitCode::SUCCESS)
        }
        Commands::CleanCache { path } => {
            commands::clean_cache::run(path.as_deref(), config).map(|()| ExitCode::SUCCESS)
        }
    };

    result.unwrap_or_else(|err| {
        commands::report_fatal(err);
        ExitCode::from(2)
    })
}
