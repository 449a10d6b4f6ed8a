//! Connector over any [`StorageBackend`] exposing the shared device tree.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use super::error::ConnectorError;
use super::queue::{WriteHandler, WriteQueue, RETRY_DELAY};
use super::state::{ActionKind, ConnectorState, StateTracker};
use super::stats::{refresh_stats, STATS_INTERVAL};
use super::{ConnectorId, ConnectorKind, SyncConnector};
use crate::ids::{SyncDeviceId, SyncModuleId};
use crate::models::{DeviceData, ModuleData, SyncRead, SyncWrite};
use crate::storage::{BackendError, FsStorage, HttpStorage, RemotePath, StorageBackend};

/// Timing options of a [`DriveConnector`].
#[derive(Debug, Clone, Copy)]
pub struct DriveOptions {
    /// Delay before a failed write is attempted again.
    pub retry_delay: Duration,
    /// Minimum age of storage stats before a read refreshes them.
    pub stats_interval: Duration,
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            retry_delay: RETRY_DELAY,
            stats_interval: STATS_INTERVAL,
        }
    }
}

/// Connector storing the device tree on a [`StorageBackend`].
///
/// Reads hold a read lock, writes and wipes hold a separate write lock, so a
/// read can run while a write is in progress but never two of the same kind.
pub struct DriveConnector {
    inner: Arc<DriveInner>,
    queue: WriteQueue,
}

struct DriveInner {
    id: ConnectorId,
    device_id: SyncDeviceId,
    backend: Arc<dyn StorageBackend>,
    tracker: StateTracker,
    data_tx: watch::Sender<Option<SyncRead>>,
    read_lock: Mutex<()>,
    write_lock: Mutex<()>,
    stats_interval: Duration,
}

impl DriveConnector {
    /// Creates a connector and starts its write queue.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(
        id: ConnectorId,
        device_id: SyncDeviceId,
        backend: Arc<dyn StorageBackend>,
        options: DriveOptions,
    ) -> Self {
        let (data_tx, _data_rx) = watch::channel(None);
        let inner = Arc::new(DriveInner {
            id,
            device_id,
            backend,
            tracker: StateTracker::new(),
            data_tx,
            read_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
            stats_interval: options.stats_interval,
        });

        let queue = WriteQueue::spawn(inner.clone(), options.retry_delay, inner.id.to_string());

        Self { inner, queue }
    }

    /// Connector for a folder on disk.
    pub fn folder(storage: FsStorage, device_id: SyncDeviceId, options: DriveOptions) -> Self {
        let id = ConnectorId::new(
            ConnectorKind::Folder,
            storage.root().display().to_string(),
        );
        Self::new(id, device_id, Arc::new(storage), options)
    }

    /// Connector for an Octi sync server account.
    pub fn server(storage: HttpStorage, device_id: SyncDeviceId, options: DriveOptions) -> Self {
        let id = ConnectorId::new(ConnectorKind::Server, storage.base_url());
        Self::new(id, device_id, Arc::new(storage), options)
    }

    /// The device this connector writes for.
    pub fn device_id(&self) -> &SyncDeviceId {
        &self.inner.device_id
    }

    /// Returns a copy of the current state.
    pub fn current_state(&self) -> ConnectorState {
        self.inner.tracker.current()
    }
}

impl DriveInner {
    async fn read_drive(&self) -> Result<SyncRead, BackendError> {
        let device_dirs = match self.backend.list(&RemotePath::devices()).await {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                tracing::debug!("{}: no devices directory yet", self.id);
                return Ok(SyncRead::empty());
            }
            Err(BackendError::NotADirectory(path)) => {
                tracing::warn!("{}: {} is not a directory, treating as empty", self.id, path);
                return Ok(SyncRead::empty());
            }
            Err(e) => return Err(e),
        };

        let mut devices = Vec::with_capacity(device_dirs.len());

        for entry in device_dirs {
            if !entry.is_dir() {
                tracing::warn!("{}: unexpected file in devices: {}", self.id, entry.name);
                continue;
            }

            let device_id = match SyncDeviceId::new(entry.name.as_str()) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("{}: skipping device directory: {}", self.id, e);
                    continue;
                }
            };

            if let Some(device) = self.read_device(device_id).await? {
                devices.push(device);
            }
        }

        Ok(SyncRead::new(devices))
    }

    /// Reads one device directory.
    ///
    /// Entries of the wrong kind skip the affected device or module. Every
    /// other backend error aborts the read.
    async fn read_device(
        &self,
        device_id: SyncDeviceId,
    ) -> Result<Option<DeviceData>, BackendError> {
        let dir = RemotePath::device(&device_id);
        let entries = match self.backend.list(&dir).await {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                tracing::debug!("{}: {} disappeared during read", self.id, dir);
                return Ok(None);
            }
            Err(e) if is_structural(&e) => {
                tracing::warn!("{}: skipping device {}: {}", self.id, device_id, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut modules = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.is_dir() {
                tracing::warn!("{}: unexpected directory in {}: {}", self.id, dir, entry.name);
                continue;
            }

            let module_id = match SyncModuleId::new(entry.name.as_str()) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("{}: skipping module file: {}", self.id, e);
                    continue;
                }
            };

            let path = RemotePath::module(&device_id, &module_id);
            let payload = match self.backend.read_file(&path).await {
                Ok(Some(payload)) if !payload.is_empty() => payload,
                Ok(Some(_)) => {
                    tracing::warn!("{}: skipping empty module {}", self.id, path);
                    continue;
                }
                Ok(None) => {
                    tracing::debug!("{}: {} disappeared during read", self.id, path);
                    continue;
                }
                Err(e) if is_structural(&e) => {
                    tracing::warn!("{}: skipping unreadable module {}: {}", self.id, path, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            modules.push(ModuleData::new(
                module_id,
                entry.created_at,
                entry.modified_at,
                payload,
            ));
        }

        Ok(Some(DeviceData::new(device_id, modules)))
    }

    async fn write_drive(&self, data: &SyncWrite) -> Result<(), ConnectorError> {
        if data.device_id != self.device_id {
            return Err(ConnectorError::ForeignDevice {
                expected: self.device_id.clone(),
                actual: data.device_id.clone(),
            });
        }

        let device_dir = RemotePath::device(&data.device_id);
        self.backend.create_dir(&device_dir).await?;

        for module in &data.modules {
            let path = RemotePath::module(&data.device_id, &module.module_id);
            let entry = self.backend.write_file(&path, &module.payload).await?;
            tracing::debug!(
                "{}: wrote {} ({} bytes, modified {})",
                self.id,
                path,
                entry.size,
                entry.modified_at
            );
        }

        Ok(())
    }

    async fn wipe_drive(&self) -> Result<(), ConnectorError> {
        let _lock = self.write_lock.lock().await;
        let _guard = self.tracker.begin(ActionKind::Write);

        tracing::info!("{}: wiping all data", self.id);

        let root = RemotePath::root();
        if let Some(entries) = self.backend.list(&root).await? {
            for entry in entries {
                let path = root.join(&entry.name).map_err(BackendError::from)?;
                self.backend.delete(&path).await?;
            }
        }

        Ok(())
    }
}

/// Layout anomalies a read skips over instead of failing.
fn is_structural(e: &BackendError) -> bool {
    matches!(e, BackendError::NotADirectory(_) | BackendError::NotAFile(_))
}

#[async_trait]
impl WriteHandler for DriveInner {
    async fn persist(&self, data: &SyncWrite) -> Result<(), ConnectorError> {
        let _lock = self.write_lock.lock().await;
        let _guard = self.tracker.begin(ActionKind::Write);
        self.write_drive(data).await
    }
}

#[async_trait]
impl SyncConnector for DriveConnector {
    fn identifier(&self) -> &ConnectorId {
        &self.inner.id
    }

    fn state(&self) -> watch::Receiver<ConnectorState> {
        self.inner.tracker.subscribe()
    }

    fn data(&self) -> watch::Receiver<Option<SyncRead>> {
        self.inner.data_tx.subscribe()
    }

    async fn read(&self) {
        let inner = &self.inner;
        let _lock = inner.read_lock.lock().await;
        let _guard = inner.tracker.begin(ActionKind::Read);

        tracing::debug!("{}: read starting", inner.id);

        match inner.read_drive().await {
            Ok(snapshot) => {
                let previous = inner.tracker.current().stats;
                let stats =
                    refresh_stats(inner.backend.as_ref(), previous, inner.stats_interval).await;

                tracing::debug!(
                    "{}: read {} device(s) as {}",
                    inner.id,
                    snapshot.devices.len(),
                    snapshot.read_id
                );

                inner.tracker.update(|state| {
                    state.last_error = None;
                    state.stats = stats;
                });
                inner.data_tx.send_replace(Some(snapshot));
            }
            Err(e) => {
                tracing::warn!("{}: read failed: {}", inner.id, e);
                inner
                    .tracker
                    .update(|state| state.last_error = Some(e.to_string()));
            }
        }
    }

    async fn write(&self, data: SyncWrite) -> Result<(), ConnectorError> {
        if data.device_id != self.inner.device_id {
            return Err(ConnectorError::ForeignDevice {
                expected: self.inner.device_id.clone(),
                actual: data.device_id,
            });
        }

        tracing::debug!(
            "{}: queueing {} module(s)",
            self.inner.id,
            data.modules.len()
        );
        self.queue.enqueue(data)
    }

    async fn flush(&self) -> Result<(), ConnectorError> {
        self.queue.flush().await
    }

    async fn wipe(&self) -> Result<(), ConnectorError> {
        // Detached so that dropping the caller's future cannot abort a wipe
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.wipe_drive().await })
            .await
            .map_err(|e| ConnectorError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RemoteEntry, StorageQuota};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Folder storage with call counters and injectable faults.
    #[derive(Debug)]
    struct TestStorage {
        inner: FsStorage,
        quota_calls: AtomicUsize,
        write_calls: AtomicUsize,
        failing_writes: AtomicUsize,
        fail_lists: AtomicBool,
        slow_lists: AtomicBool,
        slow_deletes: AtomicBool,
        /// Listing or reading this path fails with an I/O error.
        broken_path: std::sync::Mutex<Option<RemotePath>>,
    }

    impl TestStorage {
        fn new(root: &std::path::Path) -> Arc<Self> {
            Arc::new(Self {
                inner: FsStorage::new(root),
                quota_calls: AtomicUsize::new(0),
                write_calls: AtomicUsize::new(0),
                failing_writes: AtomicUsize::new(0),
                fail_lists: AtomicBool::new(false),
                slow_lists: AtomicBool::new(false),
                slow_deletes: AtomicBool::new(false),
                broken_path: std::sync::Mutex::new(None),
            })
        }

        fn check_broken(&self, path: &RemotePath) -> Result<(), BackendError> {
            if self.broken_path.lock().unwrap().as_ref() == Some(path) {
                let e = std::io::Error::new(std::io::ErrorKind::Other, "input/output error");
                return Err(BackendError::Io(path.clone(), e));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StorageBackend for TestStorage {
        async fn list(&self, dir: &RemotePath) -> Result<Option<Vec<RemoteEntry>>, BackendError> {
            if self.slow_lists.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(BackendError::Unavailable("network down".to_string()));
            }
            self.check_broken(dir)?;
            self.inner.list(dir).await
        }

        async fn create_dir(&self, dir: &RemotePath) -> Result<(), BackendError> {
            self.inner.create_dir(dir).await
        }

        async fn read_file(&self, file: &RemotePath) -> Result<Option<Vec<u8>>, BackendError> {
            self.check_broken(file)?;
            self.inner.read_file(file).await
        }

        async fn write_file(
            &self,
            file: &RemotePath,
            data: &[u8],
        ) -> Result<RemoteEntry, BackendError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            let failing = self.failing_writes.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_writes.store(failing - 1, Ordering::SeqCst);
                return Err(BackendError::Unavailable("write timed out".to_string()));
            }
            self.inner.write_file(file, data).await
        }

        async fn delete(&self, path: &RemotePath) -> Result<bool, BackendError> {
            if self.slow_deletes.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.inner.delete(path).await
        }

        async fn quota(&self) -> Result<StorageQuota, BackendError> {
            self.quota_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.quota().await
        }
    }

    const FAST: DriveOptions = DriveOptions {
        retry_delay: Duration::from_millis(10),
        stats_interval: STATS_INTERVAL,
    };

    fn dev_a() -> SyncDeviceId {
        SyncDeviceId::new("dev-A").unwrap()
    }

    fn setup_with(options: DriveOptions) -> (DriveConnector, Arc<TestStorage>, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = TestStorage::new(&temp.path().join("drive"));
        let id = ConnectorId::new(ConnectorKind::Folder, "test");
        let connector = DriveConnector::new(id, dev_a(), storage.clone(), options);
        (connector, storage, temp)
    }

    fn setup() -> (DriveConnector, Arc<TestStorage>, TempDir) {
        setup_with(FAST)
    }

    fn snapshot(connector: &DriveConnector) -> SyncRead {
        connector
            .data()
            .borrow()
            .clone()
            .expect("no snapshot published")
    }

    #[tokio::test]
    async fn test_data_is_none_before_first_read() {
        let (connector, _storage, _temp) = setup();
        assert!(connector.data().borrow().is_none());
        assert_eq!(connector.current_state(), ConnectorState::default());
    }

    #[tokio::test]
    async fn test_read_empty_root_yields_empty_snapshot() {
        let (connector, _storage, _temp) = setup();

        connector.read().await;

        assert!(snapshot(&connector).is_empty());
        let state = connector.current_state();
        assert_eq!(state.read_actions, 0);
        assert!(state.last_error.is_none());
        assert!(state.last_read_at.is_some());
    }

    #[tokio::test]
    async fn test_read_with_devices_file_yields_empty_snapshot() {
        let (connector, storage, _temp) = setup();
        storage.inner.create_dir(&RemotePath::root()).await.unwrap();
        storage
            .inner
            .write_file(&RemotePath::devices(), b"garbage")
            .await
            .unwrap();

        connector.read().await;

        assert!(snapshot(&connector).is_empty());
        assert!(connector.current_state().last_error.is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins_for_same_module() {
        let (connector, _storage, _temp) = setup();

        connector
            .write(SyncWrite::new(dev_a()).with_module(SyncModuleId::power(), "full"))
            .await
            .unwrap();
        connector
            .write(SyncWrite::new(dev_a()).with_module(SyncModuleId::power(), "charging"))
            .await
            .unwrap();
        connector.flush().await.unwrap();
        connector.read().await;

        let read = snapshot(&connector);
        assert_eq!(read.devices.len(), 1);
        let device = &read.devices[0];
        assert_eq!(device.device_id, dev_a());
        assert_eq!(device.modules.len(), 1);
        assert_eq!(device.modules[0].module_id, SyncModuleId::power());
        assert_eq!(device.modules[0].payload, b"charging");
        assert!(device.modules[0].modified_at >= device.modules[0].created_at);
    }

    #[tokio::test]
    async fn test_concurrent_writers_keep_per_module_order() {
        let (connector, _storage, _temp) = setup();
        let connector = Arc::new(connector);

        let mut tasks = Vec::new();
        for m in 0..5 {
            let connector = connector.clone();
            tasks.push(tokio::spawn(async move {
                let module_id = SyncModuleId::new(format!("module{}", m)).unwrap();
                for i in 0..5 {
                    let payload = format!("value{}", i);
                    connector
                        .write(SyncWrite::new(dev_a()).with_module(module_id.clone(), payload))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        connector.flush().await.unwrap();
        connector.read().await;

        let read = snapshot(&connector);
        let device = read.device(&dev_a()).unwrap();
        assert_eq!(device.modules.len(), 5);
        for module in &device.modules {
            assert_eq!(module.payload, b"value4");
        }
    }

    #[tokio::test]
    async fn test_malformed_module_is_skipped() {
        let (connector, storage, temp) = setup();

        connector
            .write(
                SyncWrite::new(dev_a())
                    .with_module(SyncModuleId::power(), "full")
                    .with_module(SyncModuleId::new("wifi").unwrap(), "on")
                    .with_module(SyncModuleId::new("bluetooth").unwrap(), "off"),
            )
            .await
            .unwrap();
        connector.flush().await.unwrap();

        // Truncate one module file
        std::fs::write(temp.path().join("drive/devices/dev-A/wifi"), b"").unwrap();
        // Stray entries that do not fit the layout
        std::fs::write(temp.path().join("drive/devices/stray"), b"x").unwrap();
        storage
            .inner
            .create_dir(&RemotePath::parse("devices/dev-A/nested").unwrap())
            .await
            .unwrap();

        connector.read().await;

        let read = snapshot(&connector);
        assert_eq!(read.devices.len(), 1);
        let ids: Vec<_> = read.devices[0]
            .modules
            .iter()
            .map(|m| m.module_id.as_str())
            .collect();
        assert_eq!(ids, vec!["bluetooth", "power"]);
        assert!(connector.current_state().last_error.is_none());
    }

    #[tokio::test]
    async fn test_reads_other_devices() {
        let (connector, storage, _temp) = setup();
        let dev_b = SyncDeviceId::new("dev-B").unwrap();

        storage
            .inner
            .create_dir(&RemotePath::device(&dev_b))
            .await
            .unwrap();
        storage
            .inner
            .write_file(&RemotePath::module(&dev_b, &SyncModuleId::power()), b"low")
            .await
            .unwrap();
        // A device without modules still shows up
        storage
            .inner
            .create_dir(&RemotePath::devices().join("dev-C").unwrap())
            .await
            .unwrap();

        connector.read().await;

        let read = snapshot(&connector);
        assert_eq!(read.devices.len(), 2);
        assert_eq!(
            read.module(&dev_b, &SyncModuleId::power()).unwrap().payload,
            b"low"
        );
        assert!(read
            .device(&SyncDeviceId::new("dev-C").unwrap())
            .unwrap()
            .modules
            .is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_device_fails_the_read() {
        let (connector, storage, _temp) = setup();
        let dev_b = SyncDeviceId::new("dev-B").unwrap();
        let dev_b_dir = RemotePath::device(&dev_b);
        let dev_b_power = RemotePath::module(&dev_b, &SyncModuleId::power());

        storage.inner.create_dir(&dev_b_dir).await.unwrap();
        storage.inner.write_file(&dev_b_power, b"low").await.unwrap();

        *storage.broken_path.lock().unwrap() = Some(dev_b_dir);
        connector.read().await;

        let state = connector.current_state();
        assert!(state.last_error.is_some());
        assert_eq!(state.read_actions, 0);
        assert!(connector.data().borrow().is_none());

        // Same for a module file that cannot be read
        *storage.broken_path.lock().unwrap() = Some(dev_b_power.clone());
        connector.read().await;
        assert!(connector.current_state().last_error.is_some());
        assert!(connector.data().borrow().is_none());

        *storage.broken_path.lock().unwrap() = None;
        connector.read().await;
        assert!(connector.current_state().last_error.is_none());
        assert_eq!(
            snapshot(&connector)
                .module(&dev_b, &SyncModuleId::power())
                .unwrap()
                .payload,
            b"low"
        );
    }

    #[tokio::test]
    async fn test_write_for_other_device_is_rejected() {
        let (connector, storage, _temp) = setup();

        let result = connector
            .write(
                SyncWrite::new(SyncDeviceId::new("dev-B").unwrap())
                    .with_module(SyncModuleId::power(), "full"),
            )
            .await;

        assert!(matches!(result, Err(ConnectorError::ForeignDevice { .. })));
        connector.flush().await.unwrap();
        assert_eq!(storage.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wipe_then_read_is_empty() {
        let (connector, _storage, _temp) = setup();

        connector
            .write(SyncWrite::new(dev_a()).with_module(SyncModuleId::power(), "full"))
            .await
            .unwrap();
        connector.flush().await.unwrap();
        connector.read().await;
        assert!(!snapshot(&connector).is_empty());

        connector.wipe().await.unwrap();
        connector.read().await;

        assert!(snapshot(&connector).is_empty());
        assert_eq!(connector.current_state().write_actions, 0);
    }

    #[tokio::test]
    async fn test_cancelled_wipe_still_completes() {
        let (connector, storage, _temp) = setup();

        connector
            .write(SyncWrite::new(dev_a()).with_module(SyncModuleId::power(), "full"))
            .await
            .unwrap();
        connector.flush().await.unwrap();

        storage.slow_deletes.store(true, Ordering::SeqCst);
        let cancelled = tokio::time::timeout(Duration::from_millis(20), connector.wipe()).await;
        assert!(cancelled.is_err());
        assert_eq!(connector.current_state().write_actions, 1);

        // The wipe keeps running after its caller went away
        let mut waited = Duration::ZERO;
        while connector.current_state().write_actions > 0 && waited < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
        }
        assert_eq!(connector.current_state().write_actions, 0);

        connector.read().await;
        assert!(snapshot(&connector).is_empty());
        assert_eq!(connector.current_state().write_actions, 0);
    }

    #[tokio::test]
    async fn test_wipe_on_empty_backend() {
        let (connector, _storage, _temp) = setup();
        connector.wipe().await.unwrap();
        assert!(connector.current_state().last_write_at.is_some());
    }

    #[tokio::test]
    async fn test_read_failure_is_recorded_in_state() {
        let (connector, storage, _temp) = setup();

        connector.read().await;
        let first = snapshot(&connector);

        storage.fail_lists.store(true, Ordering::SeqCst);
        connector.read().await;

        let state = connector.current_state();
        assert_eq!(state.read_actions, 0);
        assert!(state.last_error.as_deref().unwrap().contains("network down"));
        // Previous snapshot stays published
        assert_eq!(snapshot(&connector).read_id, first.read_id);

        storage.fail_lists.store(false, Ordering::SeqCst);
        connector.read().await;
        assert!(connector.current_state().last_error.is_none());
        assert_ne!(snapshot(&connector).read_id, first.read_id);
    }

    #[tokio::test]
    async fn test_failed_writes_are_retried() {
        let (connector, storage, _temp) = setup();
        storage.failing_writes.store(2, Ordering::SeqCst);

        connector
            .write(SyncWrite::new(dev_a()).with_module(SyncModuleId::power(), "full"))
            .await
            .unwrap();
        connector.flush().await.unwrap();

        assert_eq!(storage.write_calls.load(Ordering::SeqCst), 3);
        let state = connector.current_state();
        assert_eq!(state.write_actions, 0);
        // Write failures are retried, not reported as errors
        assert!(state.last_error.is_none());

        connector.read().await;
        assert_eq!(
            snapshot(&connector)
                .module(&dev_a(), &SyncModuleId::power())
                .unwrap()
                .payload,
            b"full"
        );
    }

    #[tokio::test]
    async fn test_cancelled_read_keeps_counters_balanced() {
        let (connector, storage, _temp) = setup();
        storage.slow_lists.store(true, Ordering::SeqCst);

        let result =
            tokio::time::timeout(Duration::from_millis(50), connector.read()).await;
        assert!(result.is_err());

        let state = connector.current_state();
        assert_eq!(state.read_actions, 0);
        assert!(connector.data().borrow().is_none());
    }

    #[tokio::test]
    async fn test_stats_are_throttled() {
        let (connector, storage, _temp) = setup();

        connector.read().await;
        connector.read().await;

        assert_eq!(storage.quota_calls.load(Ordering::SeqCst), 1);
        let stats = connector.current_state().stats.unwrap();
        assert_eq!(stats.storage_total, crate::storage::DEFAULT_CAPACITY);
    }

    #[tokio::test]
    async fn test_stats_refresh_after_interval() {
        let (connector, storage, _temp) = setup_with(DriveOptions {
            retry_delay: Duration::from_millis(10),
            stats_interval: Duration::ZERO,
        });

        connector.read().await;
        let first = connector.current_state().stats.unwrap();
        connector.read().await;
        let second = connector.current_state().stats.unwrap();

        assert_eq!(storage.quota_calls.load(Ordering::SeqCst), 2);
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_state_subscribers_observe_read() {
        let (connector, _storage, _temp) = setup();
        let mut state = connector.state();
        let mut data = connector.data();

        connector.read().await;

        assert!(state.has_changed().unwrap());
        assert!(state.borrow_and_update().last_read_at.is_some());
        assert!(data.has_changed().unwrap());
        assert!(data.borrow_and_update().is_some());
    }
}
