//! TOML-based application configuration.
//!
//! Stored at `~/.config/emberlog/config.toml`. Holds the application key
//! used to bootstrap a first run, the remote endpoint settings, and
//! optional path overrides for the database, credentials, and revision
//! cache files. Every field has a default so an empty file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::storage::data_dir;

/// Remote endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout for auth/summary/detail calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extended timeout for the bulk report call, which can return large payloads.
    #[serde(default = "default_report_timeout_secs")]
    pub report_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            report_timeout_secs: default_report_timeout_secs(),
        }
    }
}

/// Optional overrides for the on-disk file locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub credentials: Option<PathBuf>,
    #[serde(default)]
    pub revision_cache: Option<PathBuf>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/emberlog/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application key handed out by the remote developer portal. Only
    /// consulted when the credentials file does not carry one yet.
    #[serde(default)]
    pub application_key: Option<String>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load from the default location, or defaults if no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = data_dir()
            .map_err(|e| ConfigError::DataDir(e.to_string()))?
            .join("config.toml");
        Self::load_from(&path)
    }

    /// Load from an explicit path; the file must exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.paths.database, "emberlog.db")
    }

    pub fn credentials_path(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.paths.credentials, "credentials.json")
    }

    pub fn revision_cache_path(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.paths.revision_cache, "revisions.json")
    }

    fn resolve(&self, over: &Option<PathBuf>, name: &str) -> Result<PathBuf, ConfigError> {
        match over {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir()
                .map_err(|e| ConfigError::DataDir(e.to_string()))?
                .join(name)),
        }
    }
}

fn default_base_url() -> String {
    "https://api.ecobee.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_report_timeout_secs() -> u64 {
    45
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.remote.base_url, "https://api.ecobee.com");
        assert_eq!(cfg.remote.timeout_secs, 30);
        assert_eq!(cfg.remote.report_timeout_secs, 45);
        assert!(cfg.application_key.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "application_key = \"abc\"\n\n[remote]\nreport_timeout_secs = 90\n",
        )
        .unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.application_key.as_deref(), Some("abc"));
        assert_eq!(cfg.remote.report_timeout_secs, 90);
        assert_eq!(cfg.remote.timeout_secs, 30);
    }

    #[test]
    fn path_overrides_win() {
        let cfg = Config {
            paths: PathsConfig {
                database: Some(PathBuf::from("/tmp/custom.db")),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(cfg.database_path().unwrap(), PathBuf::from("/tmp/custom.db"));
    }
}
