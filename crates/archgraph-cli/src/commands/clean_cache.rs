//! Clean-cache command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use archgraph_core::config::loader::resolve_against;
use archgraph_core::DiskCache;

use crate::config_resolver;

/// Deletes the cache directory of a workspace.
pub fn run(path: Option<&Path>, config_path: Option<&Path>) -> Result<()> {
    let source = config_resolver::resolve(path.unwrap_or_else(|| Path::new(".")), config_path);
    let config = source.load()?;
    let root = source.workspace_root(path, &config);
    let dir = resolve_against(&root, &config.cache.dir);

    let removed = DiskCache::clear(&dir)
        .with_context(|| format!("Failed to remove cache at {}", dir.display()))?;
    if removed {
        println!("Removed cache at {}", dir.display());
    } else {
        println!("No cache at {}", dir.display());
    }
    Ok(())
}
