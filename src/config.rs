use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use octi_core::DriveOptions;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// A storage backend to sync through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectorConfig {
    /// A local or mounted folder shared between devices
    Folder {
        path: PathBuf,
        /// Capacity reported in storage stats (default: 100 MiB)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capacity_bytes: Option<u64>,
    },
    /// An octi-server account
    Server {
        url: String,
        #[serde(skip_serializing)]
        api_key: String,
    },
}

impl std::fmt::Display for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorConfig::Folder { path, .. } => write!(f, "folder {}", path.display()),
            ConnectorConfig::Server { url, .. } => write!(f, "server {}", url),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the device identity
    pub data_dir: ConfigValue<PathBuf>,
    /// Seconds to wait before retrying a failed write
    pub retry_delay_secs: ConfigValue<u64>,
    /// Minimum seconds between storage stats refreshes
    pub stats_interval_secs: ConfigValue<u64>,
    /// Configured connectors, in priority order
    pub connectors: Vec<ConfigValue<ConnectorConfig>>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    retry_delay_secs: Option<u64>,
    stats_interval_secs: Option<u64>,
    connectors: Vec<ConnectorConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let defaults = DriveOptions::default();

        // Start with defaults
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut retry_delay_secs =
            ConfigValue::new(defaults.retry_delay.as_secs(), ConfigSource::Default);
        let mut stats_interval_secs =
            ConfigValue::new(defaults.stats_interval.as_secs(), ConfigSource::Default);
        let mut connectors = Vec::new();
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());
            let base = path.parent().unwrap_or_else(|| Path::new("."));

            if let Some(dir) = file_config.data_dir {
                data_dir = ConfigValue::new(resolve(base, dir), ConfigSource::File);
            }
            if let Some(secs) = file_config.retry_delay_secs {
                retry_delay_secs = ConfigValue::new(secs, ConfigSource::File);
            }
            if let Some(secs) = file_config.stats_interval_secs {
                stats_interval_secs = ConfigValue::new(secs, ConfigSource::File);
            }
            for connector in file_config.connectors {
                let connector = match connector {
                    ConnectorConfig::Folder {
                        path,
                        capacity_bytes,
                    } => ConnectorConfig::Folder {
                        path: resolve(base, path),
                        capacity_bytes,
                    },
                    other => other,
                };
                connectors.push(ConfigValue::new(connector, ConfigSource::File));
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("OCTI_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let (Ok(url), Ok(api_key)) = (
            std::env::var("OCTI_SERVER_URL"),
            std::env::var("OCTI_API_KEY"),
        ) {
            connectors.push(ConfigValue::new(
                ConnectorConfig::Server { url, api_key },
                ConfigSource::Environment,
            ));
        }

        Ok(Self {
            data_dir,
            retry_delay_secs,
            stats_interval_secs,
            connectors,
            config_file,
        })
    }

    /// Timing options for the configured connectors.
    pub fn drive_options(&self) -> DriveOptions {
        DriveOptions {
            retry_delay: Duration::from_secs(self.retry_delay_secs.value),
            stats_interval: Duration::from_secs(self.stats_interval_secs.value),
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/octi/
    /// - macOS: ~/Library/Application Support/octi/
    /// - Windows: %APPDATA%/octi/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("octi")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/octi/
    /// - macOS: ~/Library/Application Support/octi/
    /// - Windows: %APPDATA%/octi/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("octi")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

/// Resolves relative paths against the config file's directory
fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
