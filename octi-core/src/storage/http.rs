//! HTTP client for the Octi sync server.
//!
//! The server exposes the same directory tree as [`super::FsStorage`], one
//! tree per account:
//!
//! - `GET    /v1/list[/<path>]`   list a directory (404 `not_found` if absent)
//! - `POST   /v1/dirs/<path>`     create a directory and its parents
//! - `GET    /v1/files/<path>`    read a file (404 `not_found` if absent)
//! - `PUT    /v1/files/<path>`    create or overwrite a file
//! - `DELETE /v1/files/<path>`    delete a file or directory tree
//! - `GET    /v1/quota`           storage usage
//!
//! Requests authenticate with `Authorization: Bearer <api key>`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{BackendError, RemoteEntry, RemotePath, StorageBackend, StorageQuota};

/// Default timeout for a single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error codes carried in [`ErrorBody::error`].
pub mod error_code {
    pub const NOT_A_DIRECTORY: &str = "not_a_directory";
    pub const NOT_A_FILE: &str = "not_a_file";
    pub const INVALID_PATH: &str = "invalid_path";
    pub const NOT_FOUND: &str = "not_found";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const QUOTA_EXCEEDED: &str = "quota_exceeded";
    pub const IO: &str = "io_error";
}

/// JSON body of every non-success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Response of `DELETE /v1/files/<path>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Storage backed by an Octi sync server account.
#[derive(Debug, Clone)]
pub struct HttpStorage {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpStorage {
    /// Creates a client for `server_url` using the default request timeout.
    pub fn new(server_url: &str, api_key: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_timeout(server_url, api_key, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        server_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Protocol(e.to_string()))?;

        Ok(Self {
            base_url: normalize_base_url(server_url),
            api_key: api_key.into(),
            client,
        })
    }

    /// Returns the normalized server URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str, path: &RemotePath) -> String {
        let mut url = format!("{}/v1/{}", self.base_url, endpoint);
        for segment in path.segments() {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))
    }

    /// Converts a non-success response into a backend error.
    async fn error_from(path: &RemotePath, response: Response) -> BackendError {
        let status = response.status();
        let body = response.json::<ErrorBody>().await.ok();

        if let Some(body) = &body {
            match body.error.as_str() {
                error_code::NOT_A_DIRECTORY => return BackendError::NotADirectory(path.clone()),
                error_code::NOT_A_FILE => return BackendError::NotAFile(path.clone()),
                error_code::INVALID_PATH => return BackendError::InvalidPath(body.message.clone()),
                _ => {}
            }
        }

        let message = body
            .map(|b| b.message)
            .unwrap_or_else(|| format!("Server returned status {}", status));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                BackendError::Unauthorized(message)
            }
            s if s.is_server_error() => BackendError::Unavailable(message),
            _ => BackendError::Protocol(format!("{} ({})", message, status)),
        }
    }

    /// Checks that a 404 names a missing path.
    ///
    /// A 404 without the `not_found` code comes from something other than the
    /// file API, such as a wrong base URL or a proxy.
    async fn absent(path: &RemotePath, response: Response) -> Result<(), BackendError> {
        match response.json::<ErrorBody>().await {
            Ok(body) if body.error == error_code::NOT_FOUND => Ok(()),
            Ok(body) => Err(BackendError::Protocol(format!(
                "Unexpected 404 for {}: {}",
                path, body.message
            ))),
            Err(_) => Err(BackendError::Protocol(format!(
                "Unexpected 404 for {}",
                path
            ))),
        }
    }
}

/// Adds a scheme to bare hosts and strips trailing slashes.
fn normalize_base_url(server_url: &str) -> String {
    let trimmed = server_url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[async_trait]
impl StorageBackend for HttpStorage {
    async fn list(&self, dir: &RemotePath) -> Result<Option<Vec<RemoteEntry>>, BackendError> {
        let response = self.send(self.client.get(self.url("list", dir))).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Self::absent(dir, response).await.map(|_| None),
            s if s.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| BackendError::Protocol(e.to_string())),
            _ => Err(Self::error_from(dir, response).await),
        }
    }

    async fn create_dir(&self, dir: &RemotePath) -> Result<(), BackendError> {
        let response = self.send(self.client.post(self.url("dirs", dir))).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(dir, response).await)
        }
    }

    async fn read_file(&self, file: &RemotePath) -> Result<Option<Vec<u8>>, BackendError> {
        let response = self.send(self.client.get(self.url("files", file))).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Self::absent(file, response).await.map(|_| None),
            s if s.is_success() => response
                .bytes()
                .await
                .map(|b| Some(b.to_vec()))
                .map_err(|e| BackendError::Unavailable(e.to_string())),
            _ => Err(Self::error_from(file, response).await),
        }
    }

    async fn write_file(
        &self,
        file: &RemotePath,
        data: &[u8],
    ) -> Result<RemoteEntry, BackendError> {
        let request = self.client.put(self.url("files", file)).body(data.to_vec());
        let response = self.send(request).await?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| BackendError::Protocol(e.to_string()))
        } else {
            Err(Self::error_from(file, response).await)
        }
    }

    async fn delete(&self, path: &RemotePath) -> Result<bool, BackendError> {
        let response = self.send(self.client.delete(self.url("files", path))).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Self::absent(path, response).await.map(|_| false),
            s if s.is_success() => response
                .json::<DeleteResponse>()
                .await
                .map(|r| r.deleted)
                .map_err(|e| BackendError::Protocol(e.to_string())),
            _ => Err(Self::error_from(path, response).await),
        }
    }

    async fn quota(&self) -> Result<StorageQuota, BackendError> {
        let url = format!("{}/v1/quota", self.base_url);
        let response = self.send(self.client.get(url)).await?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| BackendError::Protocol(e.to_string()))
        } else {
            Err(Self::error_from(&RemotePath::root(), response).await)
        }
    }
}
