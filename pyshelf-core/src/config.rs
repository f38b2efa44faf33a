//! Index configuration.
//!
//! The engine itself never reads ambient state; the server loads an
//! `IndexConfig` once at startup (YAML file, or env vars in dev mode) and
//! passes it down explicitly.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_fallback_url() -> String {
    "https://pypi.org/simple".to_string()
}

fn default_bucket() -> String {
    "packages".to_string()
}

fn default_true() -> bool {
    true
}

/// Recognized index options, as stored in config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Public index consulted when a package is absent locally.
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
    /// Logical bucket holding uploaded archives.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Redirect to the fallback index on a per-package miss (else 404).
    #[serde(default = "default_true")]
    pub redirect_to_fallback: bool,
    /// Allow re-uploading an existing filename.
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            fallback_url: default_fallback_url(),
            bucket: default_bucket(),
            redirect_to_fallback: true,
            overwrite: false,
        }
    }
}

impl IndexConfig {
    /// Load from a YAML file, or env vars when dev mode is active
    /// (`PYSHELF_DEV_MODE` set, or a `.env` file is present).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let dev_mode = std::env::var("PYSHELF_DEV_MODE").is_ok() || dotenvy::dotenv().is_ok();
        if dev_mode {
            info!("Dev mode activated - loading index config from env");
            Ok(Self::from_env())
        } else {
            Self::from_yaml_file(path)
        }
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn from_env() -> Self {
        let defaults = IndexConfig::default();
        IndexConfig {
            fallback_url: std::env::var("PYSHELF_FALLBACK_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.fallback_url),
            bucket: std::env::var("PYSHELF_BUCKET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.bucket),
            redirect_to_fallback: std::env::var("PYSHELF_REDIRECT_TO_FALLBACK")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.redirect_to_fallback),
            overwrite: std::env::var("PYSHELF_OVERWRITE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.overwrite),
        }
    }

    pub fn save_to_yaml_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}
