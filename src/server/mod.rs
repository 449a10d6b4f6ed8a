//! The Octi sync server.
//!
//! Serves one folder tree per account over HTTP for
//! [`octi_core::HttpStorage`]. Accounts are selected by API key.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /v1/me`: Account of the API key
//! - `GET /v1/list[/<path>]`, `POST /v1/dirs/<path>`,
//!   `GET|PUT|DELETE /v1/files/<path>`, `GET /v1/quota`: file API

pub mod auth;
pub mod config;
pub mod files;

pub use auth::{auth_middleware, Account, ApiKeyStore};
pub use config::{ApiKeyEntry, ConfigFile, ServerConfig};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use octi_core::FsStorage;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<ApiKeyStore>,
    pub data_dir: PathBuf,
    pub quota_bytes: u64,
}

impl AppState {
    pub fn new(api_keys: ApiKeyStore, data_dir: PathBuf, quota_bytes: u64) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
            data_dir,
            quota_bytes,
        }
    }

    /// Storage of one account.
    pub fn storage(&self, account: &Account) -> FsStorage {
        FsStorage::new(self.data_dir.join("accounts").join(&account.0))
            .with_capacity(self.quota_bytes)
    }
}

/// Builds the router with all public and protected routes.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(files::health));

    let protected_routes = Router::new()
        .route("/v1/me", get(files::me))
        .route("/v1/list", get(files::list_root))
        .route("/v1/list/{*path}", get(files::list))
        .route("/v1/dirs/{*path}", post(files::create_dir))
        .route(
            "/v1/files/{*path}",
            get(files::read_file)
                .put(files::write_file)
                .delete(files::delete),
        )
        .route("/v1/quota", get(files::quota))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
