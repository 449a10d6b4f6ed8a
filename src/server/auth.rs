//! Bearer-token authentication.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use octi_core::storage::{error_code, ErrorBody};
use octi_core::RemotePath;

use super::config::ApiKeyEntry;
use super::AppState;

/// Authenticated account, added to request extensions after auth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account(pub String);

/// API key store - maps SHA-256(key) -> account
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: HashMap<String, Account>,
}

impl ApiKeyStore {
    /// Builds the store, skipping entries without a key or with an account
    /// name that is not a single path segment.
    pub fn from_entries(entries: Vec<ApiKeyEntry>) -> Self {
        let mut keys = HashMap::new();

        for entry in entries {
            let valid_account = RemotePath::parse(&entry.account)
                .map(|p| p.segments().len() == 1)
                .unwrap_or(false);
            if !valid_account {
                tracing::warn!("Skipping API key with invalid account '{}'", entry.account);
                continue;
            }

            let digest = match (entry.key_sha256, entry.key) {
                (Some(digest), _) => digest.trim().to_lowercase(),
                (None, Some(key)) => hash_key(&key),
                (None, None) => {
                    tracing::warn!("Skipping API key entry for '{}' without a key", entry.account);
                    continue;
                }
            };
            keys.insert(digest, Account(entry.account));
        }

        tracing::info!("Loaded {} API key(s)", keys.len());
        Self { keys }
    }

    /// Validate an API key and return the associated account
    pub fn validate(&self, key: &str) -> Option<Account> {
        self.keys.get(&hash_key(key)).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Hex SHA-256 of an API key.
pub fn hash_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody {
            error: error_code::UNAUTHORIZED.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(key) => key,
            None => return unauthorized("Authorization header must use Bearer scheme"),
        },
        None => return unauthorized("Authorization header required"),
    };

    match state.api_keys.validate(api_key) {
        Some(account) => {
            request.extensions_mut().insert(account);
            next.run(request).await
        }
        None => unauthorized("Invalid API key"),
    }
}
