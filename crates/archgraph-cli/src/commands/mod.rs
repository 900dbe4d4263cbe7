//! Subcommand implementations.

pub mod check;
pub mod clean_cache;
pub mod init;
pub mod list_analyzers;
pub mod output;

use archgraph_core::RunError;

/// Prints an error that aborted the command.
///
/// Run errors are rendered through miette so their code and help text show.
pub fn report_fatal(err: anyhow::Error) {
    match err.downcast::<RunError>() {
        Ok(run) => eprintln!("{:?}", miette::Report::new(run)),
        Err(other) => eprintln!("error: {other:#}"),
    }
}
