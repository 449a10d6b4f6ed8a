//! Sync connectors.
//!
//! A connector reads and writes the shared device tree of one storage
//! backend and exposes two replay-latest streams:
//!
//! - [`SyncConnector::state`]: health of the connector ([`ConnectorState`])
//! - [`SyncConnector::data`]: the latest successful read, `None` before the
//!   first one
//!
//! Reads never return errors; failures show up as `last_error` in the state.
//! Writes are queued and persisted in the background (see [`WriteQueue`]).
//! Only [`SyncConnector::wipe`] reports failures to its caller.

mod drive;
mod error;
mod queue;
mod state;
mod stats;

pub use drive::{DriveConnector, DriveOptions};
pub use error::ConnectorError;
pub use queue::{WriteHandler, WriteQueue, RETRY_DELAY};
pub use state::{ActionGuard, ActionKind, ConnectorState, StateTracker, StorageStats};
pub use stats::{refresh_stats, stats_due, STATS_INTERVAL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::{SyncRead, SyncWrite};

/// Type of backend a connector talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    /// A local or mounted folder.
    Folder,
    /// An Octi sync server.
    Server,
}

impl std::fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorKind::Folder => write!(f, "folder"),
            ConnectorKind::Server => write!(f, "server"),
        }
    }
}

/// Identifies a connector by backend type and account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectorId {
    pub kind: ConnectorKind,
    /// Folder path or server URL.
    pub account: String,
}

impl ConnectorId {
    pub fn new(kind: ConnectorKind, account: impl Into<String>) -> Self {
        Self {
            kind,
            account: account.into(),
        }
    }
}

impl std::fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.account)
    }
}

/// Read/write access to one storage backend.
#[async_trait]
pub trait SyncConnector: Send + Sync {
    fn identifier(&self) -> &ConnectorId;

    /// Subscribes to connector health.
    fn state(&self) -> watch::Receiver<ConnectorState>;

    /// Subscribes to the latest successfully read snapshot.
    fn data(&self) -> watch::Receiver<Option<SyncRead>>;

    /// Reads the full remote tree and publishes it to [`Self::data`].
    ///
    /// Failures are recorded in [`Self::state`] instead of being returned.
    async fn read(&self);

    /// Queues `data` for writing and returns without waiting for it.
    ///
    /// Fails only if `data` belongs to another device or the connector is
    /// shutting down.
    async fn write(&self, data: SyncWrite) -> Result<(), ConnectorError>;

    /// Waits until all previously queued writes have been processed.
    async fn flush(&self) -> Result<(), ConnectorError>;

    /// Deletes all remote data in the connector's scope.
    async fn wipe(&self) -> Result<(), ConnectorError>;
}
