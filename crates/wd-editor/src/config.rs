//! Session configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration for a [`Session`](crate::session::Session).
///
/// Every field is optional in the JSON form; missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Base URL shared links are built on. Default: `https://mydraft.cc`.
    pub public_url: String,

    /// Seconds between autosaves of a writable session. Default: **30**.
    pub autosave_interval_secs: u64,

    /// Maximum undo depth. Default: unbounded.
    pub max_history: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            public_url: "https://mydraft.cc".to_string(),
            autosave_interval_secs: 30,
            max_history: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Autosave period, clamped to at least one second.
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }

    /// Public link for a saved diagram.
    pub fn share_url(&self, read_token: &str) -> String {
        format!("{}/{read_token}", self.public_url.trim_end_matches('/'))
    }
}
