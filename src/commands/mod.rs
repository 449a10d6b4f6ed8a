mod config_cmd;
mod device;
mod power;
mod show;
mod status;
mod wipe;
mod write;

pub use config_cmd::ConfigCommand;
pub use device::DeviceCommand;
pub use power::PowerCommand;
pub use show::ShowCommand;
pub use status::StatusCommand;
pub use wipe::WipeCommand;
pub use write::WriteCommand;

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;

use octi_core::{
    BackendError, ConnectorError, DeviceIdentity, DeviceIdentityError, DriveConnector,
    FsStorage, HttpStorage, IdError, ModuleError, SyncAggregator, SyncConnector, SyncDeviceId,
};

use crate::config::{Config, ConnectorConfig};

/// How long commands wait for queued writes before giving up.
pub const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Loads (or creates) this device's id from the configured data dir.
pub fn device_id(config: &Config) -> Result<SyncDeviceId, CommandError> {
    Ok(DeviceIdentity::new(config.data_dir.value.clone()).load_or_create()?)
}

/// Builds one connector per configured backend.
///
/// Must be called within a Tokio runtime.
pub fn connect(config: &Config, device_id: &SyncDeviceId) -> Result<SyncAggregator, CommandError> {
    if config.connectors.is_empty() {
        return Err(CommandError::NoConnectors);
    }

    let options = config.drive_options();
    let mut aggregator = SyncAggregator::new();

    for connector in &config.connectors {
        let connector = match &connector.value {
            ConnectorConfig::Folder {
                path,
                capacity_bytes,
            } => {
                let mut storage = FsStorage::new(path.clone());
                if let Some(capacity) = capacity_bytes {
                    storage = storage.with_capacity(*capacity);
                }
                DriveConnector::folder(storage, device_id.clone(), options)
            }
            ConnectorConfig::Server { url, api_key } => {
                let storage = HttpStorage::new(url, api_key.clone())?;
                DriveConnector::server(storage, device_id.clone(), options)
            }
        };
        tracing::debug!("Using connector {}", connector.identifier());
        aggregator.add(Arc::new(connector));
    }

    Ok(aggregator)
}

/// Waits for queued writes, failing once `timeout` has passed.
///
/// Writes that keep failing are retried forever by the connectors, so an
/// unreachable backend would otherwise block the command.
pub async fn flush(aggregator: &SyncAggregator, timeout: Duration) -> Result<(), CommandError> {
    match tokio::time::timeout(timeout, aggregator.flush_all()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(CommandError::FlushTimeout(timeout)),
    }
}

/// Errors from CLI commands
#[derive(Debug)]
pub enum CommandError {
    Identity(DeviceIdentityError),
    Backend(BackendError),
    Connector(ConnectorError),
    Module(ModuleError),
    InvalidId(IdError),
    Io(std::io::Error),
    Json(serde_json::Error),
    NoConnectors,
    FlushTimeout(Duration),
    AlreadyExists(std::path::PathBuf),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Identity(e) => write!(f, "{}", e),
            CommandError::Backend(e) => write!(f, "{}", e),
            CommandError::Connector(e) => write!(f, "{}", e),
            CommandError::Module(e) => write!(f, "{}", e),
            CommandError::InvalidId(e) => write!(f, "{}", e),
            CommandError::Io(e) => write!(f, "IO error: {}", e),
            CommandError::Json(e) => write!(f, "JSON error: {}", e),
            CommandError::NoConnectors => write!(
                f,
                "No connectors configured. Run 'octi config init' or set OCTI_SERVER_URL and OCTI_API_KEY."
            ),
            CommandError::FlushTimeout(timeout) => write!(
                f,
                "Writes still pending after {}s; unsent writes are lost",
                timeout.as_secs()
            ),
            CommandError::AlreadyExists(path) => {
                write!(f, "'{}' already exists (use --force to overwrite)", path.display())
            }
        }
    }
}

impl std::error::Error for CommandError {}

impl From<DeviceIdentityError> for CommandError {
    fn from(e: DeviceIdentityError) -> Self {
        CommandError::Identity(e)
    }
}

impl From<BackendError> for CommandError {
    fn from(e: BackendError) -> Self {
        CommandError::Backend(e)
    }
}

impl From<ConnectorError> for CommandError {
    fn from(e: ConnectorError) -> Self {
        CommandError::Connector(e)
    }
}

impl From<ModuleError> for CommandError {
    fn from(e: ModuleError) -> Self {
        CommandError::Module(e)
    }
}

impl From<IdError> for CommandError {
    fn from(e: IdError) -> Self {
        CommandError::InvalidId(e)
    }
}

impl From<std::io::Error> for CommandError {
    fn from(e: std::io::Error) -> Self {
        CommandError::Io(e)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::Json(e)
    }
}
