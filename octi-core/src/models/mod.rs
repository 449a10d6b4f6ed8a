mod sync_read;
mod sync_write;

pub use sync_read::{DeviceData, ModuleData, SyncRead};
pub use sync_write::{ModuleUpdate, SyncWrite};
