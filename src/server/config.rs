//! Server configuration from environment variables and the keys file.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use octi_core::storage::DEFAULT_CAPACITY;

/// API key entry in config
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyEntry {
    /// Plain key. Ignored if `key_sha256` is set.
    #[serde(default)]
    pub key: Option<String>,
    /// Hex SHA-256 of the key, so the file need not hold the key itself
    #[serde(default)]
    pub key_sha256: Option<String>,
    pub account: String,
}

/// Config file structure
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
    /// Storage quota per account in bytes
    #[serde(default = "default_quota")]
    pub quota_bytes: u64,
}

fn default_quota() -> u64 {
    DEFAULT_CAPACITY
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            quota_bytes: default_quota(),
        }
    }
}

impl ConfigFile {
    /// Loads the config file, falling back to an empty config on failure.
    pub fn load(config_path: &Path) -> Self {
        match std::fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<ConfigFile>(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                );
                tracing::warn!("No API keys loaded - all authenticated requests will fail");
                Self::default()
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Directory holding one folder per account
    pub data_dir: PathBuf,
    /// Path to config file
    pub config_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = std::env::var("OCTI_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("OCTI_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("octi-server")
            });

        let config_path = std::env::var("OCTI_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("octi-server")
                    .join("config.yaml")
            });

        Self {
            port,
            data_dir,
            config_path,
        }
    }
}
