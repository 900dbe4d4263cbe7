//! Configuration file resolution with global fallback.
//!
//! Resolves the configuration file path using a deterministic priority order:
//!
//! 1. `--config` flag (explicit path)
//! 2. `{project}/archgraph.toml` or `.archgraph.toml`
//! 3. `~/.archgraph/config.toml` (global fallback)
//! 4. No config found → defaults

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use archgraph_core::config::loader::resolve_against;
use archgraph_core::Config;

/// Where the configuration was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly specified via `--config` flag.
    Explicit(PathBuf),
    /// Found in the project directory.
    Project(PathBuf),
    /// Loaded from the global config directory (`~/.archgraph/`).
    Global(PathBuf),
    /// No config found; defaults will be used.
    Default,
}

impl ConfigSource {
    /// Returns the resolved path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Project(p) | Self::Global(p) => Some(p),
            Self::Default => None,
        }
    }

    /// Returns `true` if the config was loaded from the global directory.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global(_))
    }

    /// Loads the configuration this source points at.
    pub fn load(&self) -> Result<Config> {
        let Some(path) = self.path() else {
            return Ok(Config::default());
        };
        if self.is_global() {
            tracing::info!("Using global config: {}", path.display());
        }
        Config::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))
    }

    /// Workspace root for a run.
    ///
    /// An explicit path wins. Otherwise a project or explicit config anchors
    /// `analyzer.root` at its own directory; a global config or no config
    /// means the current directory.
    #[must_use]
    pub fn workspace_root(&self, path: Option<&Path>, config: &Config) -> PathBuf {
        if let Some(path) = path {
            return path.to_path_buf();
        }
        match self {
            Self::Explicit(file) | Self::Project(file) => {
                let base = file.parent().unwrap_or_else(|| Path::new("."));
                resolve_against(base, &config.analyzer.root)
            }
            Self::Global(_) | Self::Default => PathBuf::from("."),
        }
    }
}

/// Project-level config file names, checked in order.
const PROJECT_CONFIG_NAMES: &[&str] = &["archgraph.toml", ".archgraph.toml"];

/// Config file name within the global config directory.
const GLOBAL_CONFIG_NAME: &str = "config.toml";

/// Resolves the configuration file path.
///
/// See module-level docs for resolution order.
#[must_use]
pub fn resolve(project_dir: &Path, explicit: Option<&Path>) -> ConfigSource {
    resolve_inner(project_dir, explicit, global_config_dir())
}

/// Testable core: accepts `global_dir` as parameter to avoid env var races.
fn resolve_inner(
    project_dir: &Path,
    explicit: Option<&Path>,
    global_dir: Option<PathBuf>,
) -> ConfigSource {
    if let Some(p) = explicit {
        return ConfigSource::Explicit(p.to_path_buf());
    }

    for name in PROJECT_CONFIG_NAMES {
        let candidate = project_dir.join(name);
        if candidate.exists() {
            tracing::debug!("Found project config: {}", candidate.display());
            return ConfigSource::Project(candidate);
        }
    }

    if let Some(dir) = global_dir {
        let candidate = dir.join(GLOBAL_CONFIG_NAME);
        if candidate.exists() {
            tracing::debug!("Found global config: {}", candidate.display());
            return ConfigSource::Global(candidate);
        }
    }

    ConfigSource::Default
}

/// Returns the global config directory path.
///
/// Resolution: `$ARCHGRAPH_CONFIG_DIR` > `~/.archgraph/`
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("ARCHGRAPH_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    home::home_dir().map(|h| h.join(".archgraph"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn explicit_takes_priority_over_project() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("custom.toml");
        fs::write(&explicit, "").unwrap();

        let project = tmp.path().join("project");
        fs::create_dir(&project).unwrap();
        fs::write(project.join("archgraph.toml"), "").unwrap();

        let result = resolve_inner(&project, Some(&explicit), None);
        assert_eq!(result, ConfigSource::Explicit(explicit));
    }

    #[test]
    fn explicit_does_not_check_existence() {
        let result = resolve_inner(
            Path::new("/tmp"),
            Some(Path::new("/nonexistent.toml")),
            None,
        );
        assert_eq!(
            result,
            ConfigSource::Explicit(PathBuf::from("/nonexistent.toml"))
        );
        assert!(result.load().is_err());
    }

    #[test]
    fn plain_name_preferred_over_dot_prefix() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".archgraph.toml"), "").unwrap();
        assert_eq!(
            resolve_inner(tmp.path(), None, None),
            ConfigSource::Project(tmp.path().join(".archgraph.toml"))
        );

        fs::write(tmp.path().join("archgraph.toml"), "").unwrap();
        assert_eq!(
            resolve_inner(tmp.path(), None, None),
            ConfigSource::Project(tmp.path().join("archgraph.toml"))
        );
    }

    #[test]
    fn global_fallback_when_no_project_config() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        fs::write(global.path().join("config.toml"), "").unwrap();

        let result = resolve_inner(project.path(), None, Some(global.path().to_path_buf()));
        assert_eq!(
            result,
            ConfigSource::Global(global.path().join("config.toml"))
        );
    }

    #[test]
    fn global_dir_without_config_file_returns_default() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();

        let result = resolve_inner(project.path(), None, Some(global.path().to_path_buf()));
        assert_eq!(result, ConfigSource::Default);
        assert!(result.load().is_ok());
    }

    #[test]
    fn project_config_anchors_the_root() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("archgraph.toml");
        fs::write(&file, "[analyzer]\nroot = \"web\"\n").unwrap();

        let source = resolve_inner(tmp.path(), None, None);
        let config = source.load().unwrap();
        assert_eq!(source.workspace_root(None, &config), tmp.path().join("web"));
        assert_eq!(
            source.workspace_root(Some(Path::new("elsewhere")), &config),
            PathBuf::from("elsewhere")
        );
    }

    #[test]
    fn global_config_roots_at_current_directory() {
        let source = ConfigSource::Global(PathBuf::from("/home/me/.archgraph/config.toml"));
        assert_eq!(
            source.workspace_root(None, &Config::default()),
            PathBuf::from(".")
        );
    }

    #[test]
    fn invalid_project_config_fails_to_load() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("archgraph.toml"), "[analyzer]\nbogus = 1\n").unwrap();
        let err = resolve_inner(tmp.path(), None, None).load().unwrap_err();
        assert!(err.to_string().starts_with("Failed to load config"));
    }
}
