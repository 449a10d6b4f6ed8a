use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ids::{SyncDeviceId, SyncModuleId};

/// The payload of one module as stored by one device.
///
/// Timestamps are taken from the backend's file metadata, never from the
/// local clock of the device that wrote the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleData {
    pub module_id: SyncModuleId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl ModuleData {
    /// Creates module data, clamping `modified_at` so it is never earlier
    /// than `created_at`.
    pub fn new(
        module_id: SyncModuleId,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            module_id,
            created_at,
            modified_at: modified_at.max(created_at),
            payload,
        }
    }
}

/// Everything one device has published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceData {
    pub device_id: SyncDeviceId,
    /// Ordered by module ID, no duplicates.
    pub modules: Vec<ModuleData>,
}

impl DeviceData {
    /// Creates device data, sorting modules and keeping the first entry for
    /// any duplicated module ID.
    pub fn new(device_id: SyncDeviceId, mut modules: Vec<ModuleData>) -> Self {
        modules.sort_by(|a, b| a.module_id.cmp(&b.module_id));
        modules.dedup_by(|later, earlier| later.module_id == earlier.module_id);
        Self { device_id, modules }
    }

    pub fn module(&self, module_id: &SyncModuleId) -> Option<&ModuleData> {
        self.modules
            .binary_search_by(|m| m.module_id.cmp(module_id))
            .ok()
            .map(|idx| &self.modules[idx])
    }
}

/// An immutable snapshot produced by one successful read.
///
/// `read_id` is unique per read operation; two snapshots with equal content
/// still carry different IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRead {
    pub read_id: Uuid,
    /// Ordered by device ID, no duplicates.
    pub devices: Vec<DeviceData>,
}

impl SyncRead {
    pub fn new(mut devices: Vec<DeviceData>) -> Self {
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices.dedup_by(|later, earlier| later.device_id == earlier.device_id);
        Self {
            read_id: Uuid::new_v4(),
            devices,
        }
    }

    /// A snapshot without any devices.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device(&self, device_id: &SyncDeviceId) -> Option<&DeviceData> {
        self.devices
            .binary_search_by(|d| d.device_id.cmp(device_id))
            .ok()
            .map(|idx| &self.devices[idx])
    }

    pub fn module(
        &self,
        device_id: &SyncDeviceId,
        module_id: &SyncModuleId,
    ) -> Option<&ModuleData> {
        self.device(device_id).and_then(|d| d.module(module_id))
    }
}

impl fmt::Display for SyncRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Read {} ({} device(s))", self.read_id, self.devices.len())?;
        for device in &self.devices {
            writeln!(f, "  {}", device.device_id)?;
            for module in &device.modules {
                writeln!(
                    f,
                    "    - {} ({} bytes, modified {})",
                    module.module_id,
                    module.payload.len(),
                    module.modified_at.format("%Y-%m-%d %H:%M:%S")
                )?;
            }
        }
        Ok(())
    }
}
