//! Merged view of every device's modules.

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use octi_core::{MergedData, MergedModule, ModulePayload, PowerInfo, SyncDeviceId, SyncModuleId};

use super::{connect, device_id, CommandError, OutputFormat};
use crate::config::Config;

/// Read all connectors and show the merged data of every device
#[derive(Args)]
pub struct ShowCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Only show this module
    #[arg(long, short)]
    module: Option<SyncModuleId>,
}

#[derive(Serialize)]
struct DeviceView {
    device_id: SyncDeviceId,
    this_device: bool,
    modules: Vec<ModuleView>,
}

#[derive(Serialize)]
struct ModuleView {
    module_id: SyncModuleId,
    source: String,
    modified_at: DateTime<Utc>,
    payload: serde_json::Value,
    #[serde(skip)]
    summary: String,
}

impl ShowCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let device_id = device_id(config)?;
        let aggregator = connect(config, &device_id)?;
        aggregator.read_all().await;

        for (id, state) in aggregator.states() {
            if let Some(error) = state.last_error {
                tracing::warn!("{}: {}", id, error);
            }
        }

        let devices = views(&aggregator.merged(), &device_id, self.module.as_ref());

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            }
            OutputFormat::Text => {
                if devices.is_empty() {
                    println!("No device data found.");
                    return Ok(());
                }
                for device in &devices {
                    print_device(device);
                }
            }
        }

        Ok(())
    }
}

fn views(
    merged: &MergedData,
    own_device: &SyncDeviceId,
    only: Option<&SyncModuleId>,
) -> Vec<DeviceView> {
    merged
        .devices
        .iter()
        .map(|(device_id, modules)| DeviceView {
            device_id: device_id.clone(),
            this_device: device_id == own_device,
            modules: modules
                .values()
                .filter(|m| only.map_or(true, |id| &m.data.module_id == id))
                .map(module_view)
                .collect(),
        })
        .filter(|device| !device.modules.is_empty())
        .collect()
}

fn module_view(module: &MergedModule) -> ModuleView {
    let payload = decode_payload(&module.data.payload);
    let summary = if module.data.module_id == SyncModuleId::power() {
        PowerInfo::from_payload(&module.data.payload)
            .map(|info| info.to_string())
            .ok()
    } else {
        None
    };
    let summary = summary.unwrap_or_else(|| match &payload {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    });

    ModuleView {
        module_id: module.data.module_id.clone(),
        source: module.source.to_string(),
        modified_at: module.data.modified_at,
        payload,
        summary,
    }
}

/// JSON payloads are embedded as-is, text as a string, anything else as a size.
fn decode_payload(payload: &[u8]) -> serde_json::Value {
    if let Ok(value) = serde_json::from_slice(payload) {
        return value;
    }
    match std::str::from_utf8(payload) {
        Ok(text) => serde_json::Value::String(text.to_string()),
        Err(_) => serde_json::Value::String(format!("<{} bytes>", payload.len())),
    }
}

fn print_device(device: &DeviceView) {
    if device.this_device {
        println!("{} (this device)", device.device_id);
    } else {
        println!("{}", device.device_id);
    }

    for module in &device.modules {
        println!(
            "  {:<12} {}  [{} @ {}]",
            module.module_id,
            module.summary,
            module.source,
            module.modified_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();
}
