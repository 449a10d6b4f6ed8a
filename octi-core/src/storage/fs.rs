//! Folder-backed storage.
//!
//! Treats a local (or mounted/shared) directory as the app root of a
//! drive-style backend. All filesystem work runs on the blocking pool.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{BackendError, EntryKind, RemoteEntry, RemotePath, StorageBackend, StorageQuota};

/// Capacity reported by [`FsStorage::quota`] unless configured otherwise.
pub const DEFAULT_CAPACITY: u64 = 100 * 1024 * 1024;

/// Storage rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
    capacity: u64,
}

impl FsStorage {
    /// Creates a storage instance rooted at `root`. The directory is created
    /// lazily on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Sets the total capacity reported by [`StorageBackend::quota`].
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Returns the root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &RemotePath) -> PathBuf {
        path.segments()
            .iter()
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    async fn blocking<T, F>(f: F) -> Result<T, BackendError>
    where
        F: FnOnce() -> Result<T, BackendError> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| BackendError::Unavailable(format!("storage task failed: {}", e)))?
    }
}

fn to_utc(time: io::Result<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

fn entry_from_metadata(name: String, metadata: &Metadata) -> RemoteEntry {
    let modified_at = to_utc(metadata.modified()).unwrap_or_else(Utc::now);
    // Birth time is not available on every filesystem
    let created_at = to_utc(metadata.created()).unwrap_or(modified_at);
    let kind = if metadata.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };

    RemoteEntry {
        name,
        kind,
        size: if metadata.is_dir() { 0 } else { metadata.len() },
        created_at,
        modified_at: modified_at.max(created_at),
    }
}

fn metadata_if_exists(path: &Path, remote: &RemotePath) -> Result<Option<Metadata>, BackendError> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BackendError::Io(remote.clone(), e)),
    }
}

fn list_dir(path: &Path, remote: &RemotePath) -> Result<Option<Vec<RemoteEntry>>, BackendError> {
    match metadata_if_exists(path, remote)? {
        None => return Ok(None),
        Some(m) if !m.is_dir() => return Err(BackendError::NotADirectory(remote.clone())),
        Some(_) => {}
    }

    let entries = fs::read_dir(path).map_err(|e| BackendError::Io(remote.clone(), e))?;
    let mut result = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| BackendError::Io(remote.clone(), e))?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };

        // Temp files and other hidden entries
        if name.starts_with('.') {
            continue;
        }

        // Entry may vanish between read_dir and metadata
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };

        result.push(entry_from_metadata(name, &metadata));
    }

    result.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Some(result))
}

fn create_dir(path: &Path, remote: &RemotePath) -> Result<(), BackendError> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(_) if path.exists() && !path.is_dir() => {
            Err(BackendError::NotADirectory(remote.clone()))
        }
        Err(e) => Err(BackendError::Io(remote.clone(), e)),
    }
}

fn read_file(path: &Path, remote: &RemotePath) -> Result<Option<Vec<u8>>, BackendError> {
    match metadata_if_exists(path, remote)? {
        None => Ok(None),
        Some(m) if m.is_dir() => Err(BackendError::NotAFile(remote.clone())),
        Some(_) => match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::Io(remote.clone(), e)),
        },
    }
}

fn write_file(path: &Path, remote: &RemotePath, data: &[u8]) -> Result<RemoteEntry, BackendError> {
    let name = remote
        .name()
        .ok_or_else(|| BackendError::InvalidPath("cannot write to the app root".to_string()))?
        .to_string();

    if let Some(m) = metadata_if_exists(path, remote)? {
        if m.is_dir() {
            return Err(BackendError::NotAFile(remote.clone()));
        }
    }

    // Write atomically using temp file + rename
    let temp_path = path.with_file_name(format!(".{}.tmp", name));
    fs::write(&temp_path, data).map_err(|e| BackendError::Io(remote.clone(), e))?;
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        BackendError::Io(remote.clone(), e)
    })?;

    let metadata = fs::metadata(path).map_err(|e| BackendError::Io(remote.clone(), e))?;
    Ok(entry_from_metadata(name, &metadata))
}

fn delete(path: &Path, remote: &RemotePath) -> Result<bool, BackendError> {
    if remote.is_root() {
        return Err(BackendError::InvalidPath(
            "cannot delete the app root".to_string(),
        ));
    }

    let result = match metadata_if_exists(path, remote)? {
        None => return Ok(false),
        Some(m) if m.is_dir() => fs::remove_dir_all(path),
        Some(_) => fs::remove_file(path),
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BackendError::Io(remote.clone(), e)),
    }
}

fn disk_usage(path: &Path) -> io::Result<u64> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    if !metadata.is_dir() {
        return Ok(metadata.len());
    }

    let mut total = 0;
    for entry in fs::read_dir(path)? {
        total += disk_usage(&entry?.path())?;
    }
    Ok(total)
}

#[async_trait]
impl StorageBackend for FsStorage {
    async fn list(&self, dir: &RemotePath) -> Result<Option<Vec<RemoteEntry>>, BackendError> {
        let path = self.resolve(dir);
        let remote = dir.clone();
        Self::blocking(move || list_dir(&path, &remote)).await
    }

    async fn create_dir(&self, dir: &RemotePath) -> Result<(), BackendError> {
        let path = self.resolve(dir);
        let remote = dir.clone();
        Self::blocking(move || create_dir(&path, &remote)).await
    }

    async fn read_file(&self, file: &RemotePath) -> Result<Option<Vec<u8>>, BackendError> {
        let path = self.resolve(file);
        let remote = file.clone();
        Self::blocking(move || read_file(&path, &remote)).await
    }

    async fn write_file(
        &self,
        file: &RemotePath,
        data: &[u8],
    ) -> Result<RemoteEntry, BackendError> {
        let path = self.resolve(file);
        let remote = file.clone();
        let data = data.to_vec();
        Self::blocking(move || write_file(&path, &remote, &data)).await
    }

    async fn delete(&self, path: &RemotePath) -> Result<bool, BackendError> {
        let local = self.resolve(path);
        let remote = path.clone();
        Self::blocking(move || delete(&local, &remote)).await
    }

    async fn quota(&self) -> Result<StorageQuota, BackendError> {
        let root = self.root.clone();
        let total = self.capacity;
        Self::blocking(move || {
            let used = disk_usage(&root).map_err(|e| BackendError::Io(RemotePath::root(), e))?;
            Ok(StorageQuota { used, total })
        })
        .await
    }
}
