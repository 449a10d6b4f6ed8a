//! Remote storage backends.
//!
//! A backend exposes an app-scoped directory tree. Connectors only rely on
//! the operations of [`StorageBackend`], so the same read/write algorithm
//! runs against a plain folder ([`FsStorage`]) and against the Octi sync
//! server ([`HttpStorage`]).
//!
//! # Layout
//!
//! ```text
//! <app root>/
//!   devices/
//!     <device id>/
//!       <module id>      # opaque module payload
//! ```

mod fs;
mod http;

pub use fs::{FsStorage, DEFAULT_CAPACITY};
pub use http::{error_code, DeleteResponse, ErrorBody, HttpStorage};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{validate_segment, IdError, SyncDeviceId, SyncModuleId};

/// Name of the directory holding one sub-directory per device.
pub const DEVICES_DIR: &str = "devices";

/// A validated path relative to the backend's app root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RemotePath(Vec<String>);

impl RemotePath {
    /// The app root itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parses a `/`-separated path. Empty segments are ignored.
    pub fn parse(path: &str) -> Result<Self, IdError> {
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            validate_segment(segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    /// Appends a validated segment.
    pub fn join(&self, segment: &str) -> Result<Self, IdError> {
        validate_segment(segment)?;
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Ok(Self(segments))
    }

    /// `devices`
    pub fn devices() -> Self {
        Self(vec![DEVICES_DIR.to_string()])
    }

    /// `devices/<device id>`
    pub fn device(device_id: &SyncDeviceId) -> Self {
        Self(vec![DEVICES_DIR.to_string(), device_id.as_str().to_string()])
    }

    /// `devices/<device id>/<module id>`
    pub fn module(device_id: &SyncDeviceId, module_id: &SyncModuleId) -> Self {
        Self(vec![
            DEVICES_DIR.to_string(),
            device_id.as_str().to_string(),
            module_id.as_str().to_string(),
        ])
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The containing directory, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

/// Kind of a remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A child of a remote directory, with the backend's own metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl RemoteEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Storage usage of the account behind a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageQuota {
    pub used: u64,
    pub total: u64,
}

/// Errors reported by storage backends.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Not a directory: {0}")]
    NotADirectory(RemotePath),

    #[error("Not a file: {0}")]
    NotAFile(RemotePath),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend could not be reached or failed on its side.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error for {0}: {1}")]
    Io(RemotePath, #[source] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Returns true if retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

impl From<IdError> for BackendError {
    fn from(e: IdError) -> Self {
        BackendError::InvalidPath(e.to_string())
    }
}

/// Operations a connector needs from remote storage.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Lists the children of `dir`.
    ///
    /// Returns `Ok(None)` if the directory does not exist and
    /// [`BackendError::NotADirectory`] if `dir` is a file.
    async fn list(&self, dir: &RemotePath) -> Result<Option<Vec<RemoteEntry>>, BackendError>;

    /// Creates `dir` and any missing parents. Succeeds if it already exists.
    async fn create_dir(&self, dir: &RemotePath) -> Result<(), BackendError>;

    /// Reads a file. Returns `Ok(None)` if it does not exist.
    async fn read_file(&self, file: &RemotePath) -> Result<Option<Vec<u8>>, BackendError>;

    /// Creates or overwrites a file. The parent directory must exist.
    async fn write_file(&self, file: &RemotePath, data: &[u8])
        -> Result<RemoteEntry, BackendError>;

    /// Deletes a file or a directory tree.
    ///
    /// Returns `Ok(false)` if nothing existed at `path`.
    async fn delete(&self, path: &RemotePath) -> Result<bool, BackendError>;

    /// Returns current storage usage.
    async fn quota(&self) -> Result<StorageQuota, BackendError>;
}
