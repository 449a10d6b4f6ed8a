use serde::{Deserialize, Serialize};

use crate::ids::{SyncDeviceId, SyncModuleId};

/// A new payload for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleUpdate {
    pub module_id: SyncModuleId,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl ModuleUpdate {
    pub fn new(module_id: SyncModuleId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            module_id,
            payload: payload.into(),
        }
    }
}

/// The local device's request to publish updated module data.
///
/// A write only ever targets the device that issues it; connectors reject
/// writes whose `device_id` is not their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWrite {
    pub device_id: SyncDeviceId,
    pub modules: Vec<ModuleUpdate>,
}

impl SyncWrite {
    pub fn new(device_id: SyncDeviceId) -> Self {
        Self {
            device_id,
            modules: Vec::new(),
        }
    }

    pub fn with_module(self, module_id: SyncModuleId, payload: impl Into<Vec<u8>>) -> Self {
        self.with_update(ModuleUpdate::new(module_id, payload))
    }

    pub fn with_update(mut self, update: ModuleUpdate) -> Self {
        self.modules.push(update);
        self
    }
}
