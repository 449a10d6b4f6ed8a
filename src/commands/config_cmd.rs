use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};

use super::{CommandError, OutputFormat};
use crate::config::Config;

/// Starter config written by `config init`.
const CONFIG_TEMPLATE: &str = r#"# Octi configuration

# Where the device id is stored
# data_dir: ~/.local/share/octi

# Seconds before a failed write is retried
retry_delay_secs: 5

# Minimum seconds between storage usage refreshes
stats_interval_secs: 60

connectors:
  # A folder shared between devices (e.g. a synced or network drive)
  - type: folder
    path: sync
  # An octi-server account
  # - type: server
  #   url: http://localhost:8080
  #   api_key: your-secret-key-here
"#;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config, config_path: Option<PathBuf>) -> Result<(), CommandError> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                config_path
                                    .unwrap_or_else(Config::default_config_path)
                                    .display()
                            );
                        }
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!("retry_delay_secs: {}", config.retry_delay_secs.value);
                        println!("  source: {}", config.retry_delay_secs.source);
                        println!();

                        println!("stats_interval_secs: {}", config.stats_interval_secs.value);
                        println!("  source: {}", config.stats_interval_secs.source);
                        println!();

                        if config.connectors.is_empty() {
                            println!("connectors: none");
                        } else {
                            println!("connectors:");
                            for connector in &config.connectors {
                                println!("  - {} ({})", connector.value, connector.source);
                            }
                        }
                    }
                }
                Ok(())
            }
            ConfigSubcommand::Init { force } => {
                let path = config_path.unwrap_or_else(Config::default_config_path);
                write_template(&path, *force)?;
                println!("✓ Wrote {}", path.display());
                Ok(())
            }
        }
    }
}

fn write_template(path: &Path, force: bool) -> Result<(), CommandError> {
    if path.exists() && !force {
        return Err(CommandError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, CONFIG_TEMPLATE)?;
    Ok(())
}
