//! Publish a raw module payload.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use octi_core::{SyncModuleId, SyncWrite};

use super::{connect, device_id, flush, CommandError, DEFAULT_FLUSH_TIMEOUT_SECS};
use crate::config::Config;

/// Publish a payload for one of this device's modules
#[derive(Args)]
pub struct WriteCommand {
    /// Module to write
    module: SyncModuleId,

    /// Payload text
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    value: Option<String>,

    /// Read the payload from a file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Seconds to wait for the write to reach every connector
    #[arg(long, default_value_t = DEFAULT_FLUSH_TIMEOUT_SECS)]
    timeout: u64,
}

impl WriteCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let payload = match (&self.value, &self.file) {
            (Some(value), _) => value.as_bytes().to_vec(),
            (None, Some(path)) => std::fs::read(path)?,
            (None, None) => Vec::new(),
        };

        let device_id = device_id(config)?;
        let aggregator = connect(config, &device_id)?;

        let size = payload.len();
        aggregator
            .write_all(SyncWrite::new(device_id).with_module(self.module.clone(), payload))
            .await?;
        flush(&aggregator, Duration::from_secs(self.timeout)).await?;

        println!(
            "✓ Wrote {} ({} bytes) to {} connector(s)",
            self.module,
            size,
            aggregator.connectors().len()
        );
        Ok(())
    }
}
