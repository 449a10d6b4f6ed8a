//! File API handlers.
//!
//! Every account is an [`FsStorage`] rooted at `<data_dir>/accounts/<account>`,
//! served over the routes [`octi_core::HttpStorage`] talks to.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use octi_core::storage::{error_code, DeleteResponse, ErrorBody};
use octi_core::{
    BackendError, FsStorage, IdError, RemoteEntry, RemotePath, StorageBackend, StorageQuota,
};

use super::auth::Account;
use super::AppState;

/// Error response of the file API
#[derive(Debug)]
pub enum ApiError {
    NotFound(RemotePath),
    QuotaExceeded { needed: u64, free: u64 },
    Backend(BackendError),
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        ApiError::Backend(e)
    }
}

impl From<IdError> for ApiError {
    fn from(e: IdError) -> Self {
        ApiError::Backend(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(path) => (
                StatusCode::NOT_FOUND,
                error_code::NOT_FOUND,
                format!("Not found: {}", path),
            ),
            ApiError::QuotaExceeded { needed, free } => (
                StatusCode::INSUFFICIENT_STORAGE,
                error_code::QUOTA_EXCEEDED,
                format!("Quota exceeded: {} bytes needed, {} free", needed, free),
            ),
            ApiError::Backend(e) => {
                let (status, code) = match &e {
                    BackendError::NotADirectory(_) => {
                        (StatusCode::CONFLICT, error_code::NOT_A_DIRECTORY)
                    }
                    BackendError::NotAFile(_) => (StatusCode::CONFLICT, error_code::NOT_A_FILE),
                    BackendError::InvalidPath(_) => {
                        (StatusCode::BAD_REQUEST, error_code::INVALID_PATH)
                    }
                    BackendError::Unauthorized(_) => {
                        (StatusCode::UNAUTHORIZED, error_code::UNAUTHORIZED)
                    }
                    BackendError::Io(..)
                    | BackendError::Unavailable(_)
                    | BackendError::Protocol(_) => {
                        tracing::error!("Storage error: {}", e);
                        (StatusCode::INTERNAL_SERVER_ERROR, error_code::IO)
                    }
                };
                (status, code, e.to_string())
            }
        };

        (
            status,
            Json(ErrorBody {
                error: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Current account response
#[derive(Serialize)]
pub struct MeResponse {
    account: String,
}

pub async fn me(Extension(account): Extension<Account>) -> Json<MeResponse> {
    Json(MeResponse { account: account.0 })
}

async fn list_path(
    state: &AppState,
    account: &Account,
    path: RemotePath,
) -> Result<Json<Vec<RemoteEntry>>, ApiError> {
    match state.storage(account).list(&path).await? {
        Some(entries) => Ok(Json(entries)),
        None => Err(ApiError::NotFound(path)),
    }
}

pub async fn list_root(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> Result<Json<Vec<RemoteEntry>>, ApiError> {
    list_path(&state, &account, RemotePath::root()).await
}

pub async fn list(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(path): Path<String>,
) -> Result<Json<Vec<RemoteEntry>>, ApiError> {
    list_path(&state, &account, RemotePath::parse(&path)?).await
}

pub async fn create_dir(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(path): Path<String>,
) -> Result<StatusCode, ApiError> {
    let path = RemotePath::parse(&path)?;
    state.storage(&account).create_dir(&path).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn read_file(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let path = RemotePath::parse(&path)?;
    match state.storage(&account).read_file(&path).await? {
        Some(bytes) => {
            Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
        }
        None => Err(ApiError::NotFound(path)),
    }
}

/// Size of the file an upload replaces, 0 if there is none.
async fn replaced_size(storage: &FsStorage, path: &RemotePath) -> Result<u64, ApiError> {
    let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
        return Ok(0);
    };
    let entries = match storage.list(&parent).await {
        Ok(Some(entries)) => entries,
        // The write itself reports a parent that is a file
        Ok(None) | Err(BackendError::NotADirectory(_)) => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    Ok(entries
        .iter()
        .find(|entry| entry.name == name && !entry.is_dir())
        .map_or(0, |entry| entry.size))
}

/// Writes a file. The new size must fit into the free quota plus the size of
/// the file it replaces.
pub async fn write_file(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<Json<RemoteEntry>, ApiError> {
    let path = RemotePath::parse(&path)?;
    let storage = state.storage(&account);

    let quota = storage.quota().await?;
    let replaced = replaced_size(&storage, &path).await?;
    let free = quota.total.saturating_sub(quota.used) + replaced;
    let needed = body.len() as u64;
    if needed > free {
        tracing::warn!("Account {} is over quota", account.0);
        return Err(ApiError::QuotaExceeded { needed, free });
    }

    let entry = storage.write_file(&path, &body).await?;
    tracing::debug!("{} wrote {} ({} bytes)", account.0, path, entry.size);
    Ok(Json(entry))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(path): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let path = RemotePath::parse(&path)?;
    if state.storage(&account).delete(&path).await? {
        tracing::debug!("{} deleted {}", account.0, path);
        Ok(Json(DeleteResponse { deleted: true }))
    } else {
        Err(ApiError::NotFound(path))
    }
}

pub async fn quota(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> Result<Json<StorageQuota>, ApiError> {
    Ok(Json(state.storage(&account).quota().await?))
}
