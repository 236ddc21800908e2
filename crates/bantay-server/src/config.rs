//! Server configuration, loaded from a TOML file.
//!
//! The path comes from `BANTAY_CONFIG` and defaults to `bantay.toml`.
//! A missing file means all defaults.

use std::path::{Path, PathBuf};

use bantay_db::DbConfig;
use bantay_moderation::ModerationConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "BANTAY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "bantay.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration in {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Platform user ids allowed to use admin commands. They also
    /// receive admin notifications.
    pub admin_ids: Vec<i64>,
    pub database: DbConfig,
    pub moderation: ModerationConfig,
}

impl ServerConfig {
    /// Load from `$BANTAY_CONFIG`, or `bantay.toml` in the working
    /// directory.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| {
            warn!(path = %path.display(), error = %source, "Failed to read config");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| {
            warn!(path = %path.display(), error = %source, "Failed to parse config");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        config
            .moderation
            .validate()
            .map_err(|e| ConfigError::Invalid {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if config.admin_ids.is_empty() {
            warn!("No admin_ids configured; admin commands are disabled");
        }

        Ok(config)
    }
}
