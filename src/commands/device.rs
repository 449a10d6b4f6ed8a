//! Device identity commands.

use clap::{Args, Subcommand};

use octi_core::DeviceIdentity;

use super::CommandError;
use crate::config::Config;

/// Manage this device's identity
#[derive(Args)]
pub struct DeviceCommand {
    #[command(subcommand)]
    command: DeviceSubcommand,
}

#[derive(Subcommand)]
enum DeviceSubcommand {
    /// Show this device's sync id, creating it on first use
    Show,
}

impl DeviceCommand {
    pub fn run(&self, config: &Config) -> Result<(), CommandError> {
        match &self.command {
            DeviceSubcommand::Show => self.show(config),
        }
    }

    fn show(&self, config: &Config) -> Result<(), CommandError> {
        let identity = DeviceIdentity::new(config.data_dir.value.clone());
        let existed = identity.load()?.is_some();
        let device_id = identity.load_or_create()?;

        println!("Device");
        println!("======");
        println!();
        println!("ID: {}", device_id);
        println!("Data directory: {}", identity.data_dir().display());
        if !existed {
            println!();
            println!("✓ Generated a new device id");
        }

        Ok(())
    }
}
