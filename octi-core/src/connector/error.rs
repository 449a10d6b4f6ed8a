use thiserror::Error;

use crate::ids::SyncDeviceId;
use crate::storage::BackendError;

/// Errors that can occur in connector operations.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Connector of device {expected} cannot write data for device {actual}")]
    ForeignDevice {
        expected: SyncDeviceId,
        actual: SyncDeviceId,
    },

    #[error("Write queue is closed")]
    QueueClosed,

    #[error("Connector task failed: {0}")]
    TaskFailed(String),
}

impl ConnectorError {
    /// Returns true if repeating the failed operation later may succeed.
    ///
    /// Structural errors (wrong entry kind, invalid path, foreign device)
    /// fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectorError::Backend(e) => !matches!(
                e,
                BackendError::NotADirectory(_)
                    | BackendError::NotAFile(_)
                    | BackendError::InvalidPath(_)
            ),
            ConnectorError::ForeignDevice { .. }
            | ConnectorError::QueueClosed
            | ConnectorError::TaskFailed(_) => false,
        }
    }
}
