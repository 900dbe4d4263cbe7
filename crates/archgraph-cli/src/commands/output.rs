//! Shared output formatting for analysis reports.

use std::fmt::Write as _;
use std::io::IsTerminal;

use anyhow::Result;
use archgraph_core::{AnalysisReport, Diagnostic, Severity};

use crate::OutputFormat;

/// Print a report in the specified format.
pub fn print(report: &AnalysisReport, format: OutputFormat) -> Result<()> {
    let color = std::io::stdout().is_terminal();
    print!("{}", render(report, format, color)?);
    Ok(())
}

/// Renders a report to a string.
pub fn render(report: &AnalysisReport, format: OutputFormat, color: bool) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => render_text(report, color),
        OutputFormat::Json => serde_json::to_string_pretty(report)? + "\n",
        OutputFormat::Compact => render_compact(report),
    })
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if color {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn severity_label(severity: Severity, color: bool) -> String {
    let code = match severity {
        Severity::Error => "31",
        Severity::Warning => "33",
        Severity::Info => "34",
    };
    paint(&severity.to_string(), code, color)
}

fn render_diagnostic(out: &mut String, d: &Diagnostic, color: bool) {
    let _ = writeln!(out, "{} {} at {}", d.code, d.rule, d.location);
    let _ = writeln!(out, "  {}: {}", severity_label(d.severity, color), d.message);
    for label in &d.evidence {
        let _ = writeln!(out, "  - {}: {}", label.location, label.message);
    }
    if let Some(help) = &d.help {
        let _ = writeln!(out, "  = help: {help}");
    }
    out.push('\n');
}

fn render_text(report: &AnalysisReport, color: bool) -> String {
    let mut out = String::new();
    for d in &report.diagnostics {
        render_diagnostic(&mut out, d, color);
    }

    let (errors, warnings, infos) = report.count_by_severity();
    let summary = &report.summary;
    let code = if errors > 0 {
        "31"
    } else if warnings > 0 {
        "33"
    } else {
        "32"
    };
    let line = format!(
        "Found {errors} error(s), {warnings} warning(s), {infos} info(s) \
         in {} file(s) across {} package(s)",
        summary.files_scanned, summary.packages
    );
    let _ = writeln!(out, "{}", paint(&line, code, color));
    let _ = writeln!(
        out,
        "{} import edge(s), cache hit ratio {:.0}% ({} hit(s), {} miss(es)), {} ms",
        summary.edges,
        summary.cache_hit_ratio() * 100.0,
        summary.cache_hits,
        summary.cache_misses,
        summary.elapsed_ms
    );
    out
}

fn render_compact(report: &AnalysisReport) -> String {
    let mut out = String::new();
    for d in &report.diagnostics {
        let _ = writeln!(out, "{d}");
    }
    out
}
