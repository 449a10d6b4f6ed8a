//! Delete all synced data.

use std::io::{self, Write};

use clap::Args;

use super::{connect, device_id, CommandError};
use crate::config::Config;

/// Delete all data of every device from every connector
#[derive(Args)]
pub struct WipeCommand {
    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl WipeCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let device_id = device_id(config)?;
        let aggregator = connect(config, &device_id)?;

        if !self.yes && !self.confirm(aggregator.connectors().len())? {
            println!("Cancelled.");
            return Ok(());
        }

        aggregator.wipe_all().await?;
        println!("✓ Wiped {} connector(s)", aggregator.connectors().len());
        Ok(())
    }

    fn confirm(&self, connectors: usize) -> Result<bool, CommandError> {
        print!(
            "Delete all synced data of all devices from {} connector(s)? [y/N] ",
            connectors
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        Ok(input.trim().eq_ignore_ascii_case("y"))
    }
}
