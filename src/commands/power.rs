//! Power status module.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};

use octi_core::modules::DEFAULT_SYSFS_ROOT;
use octi_core::{ModulePayload, PowerInfo, SyncModuleId, SyncWrite};

use super::{connect, device_id, flush, CommandError, OutputFormat, DEFAULT_FLUSH_TIMEOUT_SECS};
use crate::config::Config;

/// Publish or show device power status
#[derive(Args)]
pub struct PowerCommand {
    #[command(subcommand)]
    command: PowerSubcommand,
}

#[derive(Subcommand)]
enum PowerSubcommand {
    /// Read this device's power status and publish it
    Publish {
        /// power_supply directory to read from
        #[arg(long, default_value = DEFAULT_SYSFS_ROOT)]
        sysfs: PathBuf,

        /// Seconds to wait for the write to reach every connector
        #[arg(long, default_value_t = DEFAULT_FLUSH_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Show the power status of all devices
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl PowerCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        match &self.command {
            PowerSubcommand::Publish { sysfs, timeout } => {
                self.publish(config, sysfs, Duration::from_secs(*timeout))
                    .await
            }
            PowerSubcommand::Show { format } => self.show(config, *format).await,
        }
    }

    async fn publish(
        &self,
        config: &Config,
        sysfs: &Path,
        timeout: Duration,
    ) -> Result<(), CommandError> {
        let info = PowerInfo::from_sysfs(sysfs)?;
        let device_id = device_id(config)?;
        let aggregator = connect(config, &device_id)?;

        aggregator
            .write_all(SyncWrite::new(device_id).with_update(info.to_update()?))
            .await?;
        flush(&aggregator, timeout).await?;

        println!("✓ Published power status: {}", info);
        Ok(())
    }

    async fn show(&self, config: &Config, format: OutputFormat) -> Result<(), CommandError> {
        let device_id = device_id(config)?;
        let aggregator = connect(config, &device_id)?;
        aggregator.read_all().await;

        let merged = aggregator.merged();
        let mut entries = Vec::new();
        for (device, module) in merged.modules_of(&SyncModuleId::power()) {
            match PowerInfo::from_payload(&module.data.payload) {
                Ok(info) => entries.push((device.clone(), info)),
                Err(e) => tracing::warn!("Skipping power status of {}: {}", device, e),
            }
        }

        match format {
            OutputFormat::Json => {
                let map: std::collections::BTreeMap<_, _> = entries.into_iter().collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            }
            OutputFormat::Text => {
                if entries.is_empty() {
                    println!("No power status published yet.");
                    println!();
                    println!("Run 'octi power publish' on a device to share it.");
                    return Ok(());
                }
                for (device, info) in &entries {
                    let marker = if *device == device_id { " (this device)" } else { "" };
                    println!("{}{}: {}", device, marker, info);
                }
            }
        }

        Ok(())
    }
}
