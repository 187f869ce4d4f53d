//! Configuration management for tv.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (TASKVAULT_HOME, TASKVAULT_CONFIG)
//! 2. Config file (<data dir>/config.toml)
//! 3. Default values

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taskvault_core::StoreConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Paths
    #[serde(default)]
    pub paths: PathsConfig,

    /// Task and knowledge store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Terminal output
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one folder per project
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Colorize terminal output
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "taskvault", "taskvault") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".taskvault")
    }
}

fn default_projects_dir() -> PathBuf {
    default_data_dir().join("projects")
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        if let Ok(home) = std::env::var("TASKVAULT_HOME") {
            config.paths.projects_dir = PathBuf::from(home);
        }
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TASKVAULT_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Directory where backups made by `tv import --backup` are placed.
    pub fn backups_dir(&self) -> PathBuf {
        self.paths.projects_dir.join(".backups")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.paths.projects_dir.ends_with("projects"));
        assert_eq!(config.store, StoreConfig::default());
        assert!(config.output.color);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = tempdir().expect("Failed to create temp dir");
        let config = Config::load_from(&temp.path().join("nope.toml")).unwrap();
        assert_eq!(config.store.max_depth, 16);
    }

    #[test]
    fn test_load_partial_file() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[paths]
projects_dir = "/srv/taskvault"

[store]
max_depth = 8
fsync = false

[output]
color = false
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.paths.projects_dir, PathBuf::from("/srv/taskvault"));
        assert_eq!(config.store.max_depth, 8);
        assert!(!config.store.fsync);
        // Unset keys keep their defaults
        assert!(config.store.file_lock);
        assert_eq!(config.store.recent_knowledge_limit, 5);
        assert!(!config.output.color);
        assert_eq!(config.backups_dir(), PathBuf::from("/srv/taskvault/.backups"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[store]\nmax_depth = \"deep\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
