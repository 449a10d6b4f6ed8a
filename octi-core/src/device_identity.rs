//! Persistent identity of the local device.
//!
//! The device ID is generated once on first use and stored as plain text:
//!
//! ```text
//! ~/.local/share/octi/
//! └── device_id        # text file with the device ID
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ids::{IdError, SyncDeviceId};

/// Filename for the device ID file.
const DEVICE_ID_FILE: &str = "device_id";

/// Errors that can occur while loading or storing the device identity.
#[derive(Error, Debug)]
pub enum DeviceIdentityError {
    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] io::Error),

    #[error("Invalid device ID in {}: {}", .0.display(), .1)]
    InvalidId(PathBuf, #[source] IdError),
}

/// Provides the stable [`SyncDeviceId`] of this install.
#[derive(Clone, Debug)]
pub struct DeviceIdentity {
    data_dir: PathBuf,
}

impl DeviceIdentity {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn id_path(&self) -> PathBuf {
        self.data_dir.join(DEVICE_ID_FILE)
    }

    /// Loads the stored device ID.
    ///
    /// Returns `Ok(None)` if no ID has been generated yet.
    pub fn load(&self) -> Result<Option<SyncDeviceId>, DeviceIdentityError> {
        let path = self.id_path();

        match fs::read_to_string(&path) {
            Ok(content) => {
                let id = SyncDeviceId::new(content.trim())
                    .map_err(|e| DeviceIdentityError::InvalidId(path, e))?;
                Ok(Some(id))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeviceIdentityError::Io(path, e)),
        }
    }

    /// Loads the device ID, generating and persisting a new one on first use.
    pub fn load_or_create(&self) -> Result<SyncDeviceId, DeviceIdentityError> {
        if let Some(id) = self.load()? {
            return Ok(id);
        }

        let id = SyncDeviceId::generate();
        self.save(&id)?;
        tracing::info!("Generated new device ID {}", id);
        Ok(id)
    }

    fn save(&self, id: &SyncDeviceId) -> Result<(), DeviceIdentityError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| DeviceIdentityError::Io(self.data_dir.clone(), e))?;

        let path = self.id_path();
        fs::write(&path, id.as_str()).map_err(|e| DeviceIdentityError::Io(path, e))?;

        Ok(())
    }
}
