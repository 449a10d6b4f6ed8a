//! Octi Core Library
//!
//! Device identity, sync connectors and storage backends shared by the Octi
//! CLI and server.

pub mod aggregate;
pub mod connector;
pub mod device_identity;
pub mod ids;
pub mod models;
pub mod modules;
pub mod storage;

pub use aggregate::{MergedData, MergedModule, SyncAggregator};
pub use connector::{
    ConnectorError, ConnectorId, ConnectorKind, ConnectorState, DriveConnector, DriveOptions,
    StorageStats, SyncConnector,
};
pub use device_identity::{DeviceIdentity, DeviceIdentityError};
pub use ids::{IdError, SyncDeviceId, SyncModuleId};
pub use models::{DeviceData, ModuleData, ModuleUpdate, SyncRead, SyncWrite};
pub use modules::{ChargeStatus, ModuleError, ModulePayload, PowerInfo};
pub use storage::{
    BackendError, FsStorage, HttpStorage, RemoteEntry, RemotePath, StorageBackend, StorageQuota,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
