//! Octi Sync Server
//!
//! Stores the device trees of Octi accounts so devices without a shared
//! folder can sync through HTTP.
//!
//! # Configuration
//!
//! Environment variables:
//! - `OCTI_PORT`: Port to listen on (default: 8080)
//! - `OCTI_DATA_DIR`: Directory to store account data (default: ~/.local/share/octi-server)
//! - `OCTI_SERVER_CONFIG`: Path to config file (default: ~/.config/octi-server/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "your-secret-key-here"
//!     account: "alice"
//!   - key_sha256: "<hex sha-256 of the key>"
//!     account: "bob"
//! quota_bytes: 104857600
//! ```

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use octi::server::{router, ApiKeyStore, AppState, ConfigFile, ServerConfig};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "octi=info,octi_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    // Ensure data directory exists
    if let Err(e) = std::fs::create_dir_all(config.data_dir.join("accounts")) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Config file: {}", config.config_path.display());

    let file = ConfigFile::load(&config.config_path);
    tracing::info!("Quota per account: {} bytes", file.quota_bytes);

    let state = AppState::new(
        ApiKeyStore::from_entries(file.api_keys),
        config.data_dir,
        file.quota_bytes,
    );
    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
