// Configuration file handling

use crate::paths::PATHS_FILE_NAME;
use crate::store::DB_FILE_NAME;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "commute-log";
const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding the commute log
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// JSONL file holding path configurations
    #[serde(default = "default_paths_file")]
    pub paths_file: PathBuf,
}

fn data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

fn default_database() -> PathBuf {
    data_dir().join(DB_FILE_NAME)
}

fn default_paths_file() -> PathBuf {
    data_dir().join(PATHS_FILE_NAME)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            paths_file: default_paths_file(),
        }
    }
}

impl Config {
    /// Platform config location, e.g. `~/.config/commute-log/config.yaml`
    pub fn default_file() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(CONFIG_FILE_NAME)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, yaml).with_context(|| format!("Failed to write config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(&temp.path().join("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.database.ends_with(DB_FILE_NAME));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.yaml");
        let config = Config {
            database: temp.path().join("my.db"),
            paths_file: temp.path().join("my-paths.jsonl"),
        };

        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "database: /tmp/elsewhere.db\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(config.paths_file, default_paths_file());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "database: [unterminated\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
