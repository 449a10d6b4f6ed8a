//! Typed module payloads.
//!
//! Connectors treat payloads as opaque bytes. Modules give them meaning by
//! encoding a typed value as JSON.

mod power;

pub use power::{ChargeStatus, PowerInfo, DEFAULT_SYSFS_ROOT};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::ids::SyncModuleId;
use crate::models::ModuleUpdate;

/// Errors that can occur while producing or decoding module payloads.
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Failed to encode module {0}: {1}")]
    Encode(SyncModuleId, #[source] serde_json::Error),

    #[error("Failed to decode module {0}: {1}")]
    Decode(SyncModuleId, #[source] serde_json::Error),

    #[error("Failed to read {}: {}", .0.display(), .1)]
    Io(std::path::PathBuf, #[source] std::io::Error),
}

/// A value stored as the payload of one module.
pub trait ModulePayload: Serialize + DeserializeOwned {
    fn module_id() -> SyncModuleId;

    fn to_payload(&self) -> Result<Vec<u8>, ModuleError> {
        serde_json::to_vec(self).map_err(|e| ModuleError::Encode(Self::module_id(), e))
    }

    fn from_payload(payload: &[u8]) -> Result<Self, ModuleError> {
        serde_json::from_slice(payload).map_err(|e| ModuleError::Decode(Self::module_id(), e))
    }

    /// Wraps the encoded value as an update for [`crate::SyncWrite`].
    fn to_update(&self) -> Result<ModuleUpdate, ModuleError> {
        Ok(ModuleUpdate::new(Self::module_id(), self.to_payload()?))
    }
}
