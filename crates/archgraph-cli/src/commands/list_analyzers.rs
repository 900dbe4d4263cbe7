//! List analyzers command implementation.

use archgraph_rules::all_analyzers;

/// Runs the list-analyzers command.
pub fn run() {
    println!("Available analyzers:\n");
    println!(
        "{:<14} {:<20} {:<17} Description",
        "Codes", "Name", "Category"
    );
    println!("{}", "-".repeat(90));

    for analyzer in all_analyzers() {
        println!(
            "{:<14} {:<20} {:<17} {}",
            analyzer.codes().join(", "),
            analyzer.name(),
            analyzer.category().as_str(),
            analyzer.description()
        );
    }

    println!("\nPipeline diagnostics:");
    println!("  AG203  unresolved-import          (dependency)");
    println!("  AG301  parse-error                (configuration)");
    println!("  AG302  unmatched-package-pattern  (configuration)");
    println!("  AG303  invalid-manifest           (configuration)");

    println!("\nDisable a category or override its severity in archgraph.toml, e.g.:");
    println!("  [categories.dependency]");
    println!("  severity = \"warning\"");
}
