//! Init command implementation.

use std::path::Path;

use anyhow::{bail, Result};

const DEFAULT_CONFIG: &str = r#"# archgraph configuration

[analyzer]
# Workspace root, relative to this file
# root = "."

# Directories holding a package.json that count as packages
packages = [".", "packages/*"]

# Glob patterns to exclude from analysis
exclude = [
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/coverage/**",
]

# Respect .gitignore files
respect_gitignore = true

# Drop diagnostics below this severity: "info" | "warning" | "error"
min_severity = "info"

[cache]
enabled = true
dir = ".archgraph-cache"

[cycles]
# "file" or "package"
granularity = "file"

[dependencies]
# Whether `import type` counts as using a dependency
count_type_only = true
unused_severity = "warning"
ignore = ["@types/*"]

# Each category can be disabled or have its severity overridden
# [categories.circular-import]
# enabled = true
# severity = "warning"

# [architecture]
# enforce_public_api = false
# allow_barrel_exports = ["**/index.ts"]

# [[layers]]
# name = "app"
# paths = ["packages/app/**"]
# allow = ["core"]
#
# [[layers]]
# name = "core"
# paths = ["packages/core/**"]
"#;

/// Runs the init command.
pub fn run(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join("archgraph.toml");

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)?;

    println!("Created {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Edit archgraph.toml to match your package layout");
    println!("  2. Run: archgraph check");

    Ok(())
}
