use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::db::SqliteStore;
use crate::validation::DescriptionPolicy;

pub const ENV_DB: &str = "APPTRACK_DB";
pub const ENV_API_URL: &str = "APPTRACK_API_URL";
pub const ENV_LOG: &str = "APPTRACK_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file; the platform data directory when unset.
    pub database_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub api_timeout_secs: u64,
    pub log_level: Option<String>,
    pub description_policy: DescriptionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            api_url: None,
            api_timeout_secs: 10,
            log_level: None,
            description_policy: DescriptionPolicy::default(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "apptrack")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Reads `path`, or the default location when `None`.
    ///
    /// Returns the default configuration if the file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(db) = set(ENV_DB) {
            self.database_path = Some(PathBuf::from(db));
        }
        if let Some(url) = set(ENV_API_URL) {
            self.api_url = Some(url);
        }
        if let Some(level) = set(ENV_LOG) {
            self.log_level = Some(level);
        }
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(SqliteStore::default_path)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_timeout(), Duration::from_secs(10));
        assert_eq!(config.description_policy, DescriptionPolicy::Strict);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "api_url = \"http://localhost:3000/api/v1\"\ndescription_policy = \"permissive\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:3000/api/v1"));
        assert_eq!(config.description_policy, DescriptionPolicy::Permissive);
        assert_eq!(config.api_timeout_secs, 10);
        assert_eq!(config.database_path, None);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "description_policy = \"lenient\"\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DB, "/tmp/jobs.db"),
            (ENV_API_URL, "  "),
            (ENV_LOG, "debug"),
        ]
        .into_iter()
        .collect();

        let config = Config {
            api_url: Some("http://example.test".to_string()),
            ..Config::default()
        }
        .with_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path(), PathBuf::from("/tmp/jobs.db"));
        // blank values don't override
        assert_eq!(config.api_url.as_deref(), Some("http://example.test"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }
}
