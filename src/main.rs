use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use octi::commands::{
    ConfigCommand, DeviceCommand, PowerCommand, ShowCommand, StatusCommand, WipeCommand,
    WriteCommand,
};
use octi::config::Config;

#[derive(Parser)]
#[command(name = "octi")]
#[command(version)]
#[command(about = "Share device state between your devices", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage this device's identity
    Device(DeviceCommand),

    /// Show connector health
    Status(StatusCommand),

    /// Show data of all devices
    Show(ShowCommand),

    /// Publish a module payload
    Write(WriteCommand),

    /// Publish or show power status
    Power(PowerCommand),

    /// Delete all synced data
    Wipe(WipeCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "octi=warn,octi_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.clone())?;

    match cli.command {
        Some(Commands::Device(cmd)) => cmd.run(&config)?,
        Some(Commands::Status(cmd)) => cmd.run(&config).await?,
        Some(Commands::Show(cmd)) => cmd.run(&config).await?,
        Some(Commands::Write(cmd)) => cmd.run(&config).await?,
        Some(Commands::Power(cmd)) => cmd.run(&config).await?,
        Some(Commands::Wipe(cmd)) => cmd.run(&config).await?,
        Some(Commands::Config(cmd)) => cmd.run(&config, cli.config)?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
