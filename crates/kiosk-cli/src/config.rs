//! CLI configuration.
//!
//! Settings come from three layers, weakest first: built-in defaults,
//! the user config file at `<config-dir>/kiosk/config.toml`, and the
//! `KIOSK_ROOT` / `KIOSK_REPOSITORY` environment variables. Command
//! line flags override all of these.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default deployment root.
const DEFAULT_ROOT: &str = "/content";

/// Default artifact repository, where deploy looks for payloads.
const DEFAULT_REPOSITORY: &str = "/var/lib/kiosk/repository";

/// Resolved CLI settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Deployment root directory.
    pub root: PathBuf,
    /// Directory artifact payloads and manifests are fetched from.
    pub repository: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            repository: PathBuf::from(DEFAULT_REPOSITORY),
        }
    }
}

impl Config {
    /// Load configuration from the user config file and environment.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        if let Ok(root) = std::env::var("KIOSK_ROOT") {
            config.root = PathBuf::from(root);
        }
        if let Ok(repository) = std::env::var("KIOSK_REPOSITORY") {
            config.repository = PathBuf::from(repository);
        }
        Ok(config)
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Apply command line overrides.
    pub fn with_overrides(mut self, root: Option<PathBuf>, repository: Option<PathBuf>) -> Self {
        if let Some(root) = root {
            self.root = root;
        }
        if let Some(repository) = repository {
            self.repository = repository;
        }
        self
    }

    fn config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kiosk/config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_standard_paths() {
        let c = Config::default();
        assert_eq!(c.root, PathBuf::from("/content"));
        assert_eq!(c.repository, PathBuf::from("/var/lib/kiosk/repository"));
    }

    #[test]
    fn partial_config_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "root = \"/srv/content\"\n").unwrap();
        let c = Config::from_file(&path).unwrap();
        assert_eq!(c.root, PathBuf::from("/srv/content"));
        assert_eq!(c.repository, PathBuf::from("/var/lib/kiosk/repository"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "rooot = \"/typo\"\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn overrides_beat_file_values() {
        let c = Config::default().with_overrides(Some(PathBuf::from("/tmp/r")), None);
        assert_eq!(c.root, PathBuf::from("/tmp/r"));
        assert_eq!(c.repository, PathBuf::from("/var/lib/kiosk/repository"));
    }
}
