//! Identifiers for devices and data modules.
//!
//! Both identifiers end up as names in the remote directory tree
//! (`devices/<device id>/<module id>`), so they share the same validation:
//! a non-empty single path segment that is not hidden and cannot escape
//! its parent directory.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when constructing identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Identifier must not be empty")]
    Empty,

    #[error("Identifier '{0}' contains a path separator")]
    PathSeparator(String),

    #[error("Identifier '{0}' must not start with '.'")]
    Hidden(String),
}

/// Validates that `value` can be used as a single remote path segment.
pub(crate) fn validate_segment(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value.contains('/') || value.contains('\\') {
        return Err(IdError::PathSeparator(value.to_string()));
    }
    // Also rejects "." and ".."
    if value.starts_with('.') {
        return Err(IdError::Hidden(value.to_string()));
    }
    Ok(())
}

/// Identifies the device that produced a set of module data.
///
/// Generated once per install (see [`crate::DeviceIdentity`]) and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SyncDeviceId(String);

impl SyncDeviceId {
    /// Generate a new random device ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier string.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        validate_segment(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SyncDeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SyncDeviceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for SyncDeviceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Names a logical data module, one per feature area (e.g. `power`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SyncModuleId(String);

impl SyncModuleId {
    /// Module carrying [`crate::modules::PowerInfo`].
    pub const POWER: &'static str = "power";

    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        validate_segment(&id)?;
        Ok(Self(id))
    }

    /// The power status module.
    pub fn power() -> Self {
        Self(Self::POWER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SyncModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SyncModuleId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for SyncModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}
