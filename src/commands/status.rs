//! Connector health.

use clap::Args;
use serde::Serialize;

use octi_core::{ConnectorId, ConnectorState};

use super::{connect, device_id, CommandError, OutputFormat};
use crate::config::Config;

/// Read every connector once and show its state
#[derive(Args)]
pub struct StatusCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Serialize)]
struct ConnectorStatus {
    connector: String,
    #[serde(flatten)]
    state: ConnectorState,
}

impl StatusCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let device_id = device_id(config)?;
        let aggregator = connect(config, &device_id)?;
        aggregator.read_all().await;

        let states = aggregator.states();
        match self.format {
            OutputFormat::Json => {
                let statuses: Vec<_> = states
                    .into_iter()
                    .map(|(id, state)| ConnectorStatus {
                        connector: id.to_string(),
                        state,
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            }
            OutputFormat::Text => {
                println!("Device: {}", device_id);
                for (id, state) in &states {
                    println!();
                    print_state(id, state);
                }
            }
        }

        Ok(())
    }
}

fn print_state(id: &ConnectorId, state: &ConnectorState) {
    let health = if state.last_error.is_some() { "✗" } else { "✓" };
    println!("{} {}", health, id);

    match state.last_read_at {
        Some(at) => println!("  last read:  {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  last read:  never"),
    }
    if let Some(at) = state.last_write_at {
        println!("  last write: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(error) = &state.last_error {
        println!("  error:      {}", error);
    }
    if let Some(stats) = &state.stats {
        println!(
            "  storage:    {} of {} used ({:.0}%)",
            format_bytes(stats.storage_used),
            format_bytes(stats.storage_total),
            stats.usage_ratio() * 100.0
        );
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(100 * 1024 * 1024), "100.0 MiB");
    }
}
