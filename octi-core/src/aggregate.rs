//! Merging the views of several connectors.
//!
//! Every connector holds its own copy of the device tree. The aggregator
//! combines their latest snapshots per device and module, keeping the entry
//! with the newest `modified_at` (last writer wins).

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::connector::{ConnectorError, ConnectorId, ConnectorState, SyncConnector};
use crate::ids::{SyncDeviceId, SyncModuleId};
use crate::models::{ModuleData, SyncWrite};

/// Module data together with the connector it was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedModule {
    pub source: ConnectorId,
    pub data: ModuleData,
}

/// Cross-connector view of all devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedData {
    pub devices: BTreeMap<SyncDeviceId, BTreeMap<SyncModuleId, MergedModule>>,
}

impl MergedData {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn module(&self, device_id: &SyncDeviceId, module_id: &SyncModuleId) -> Option<&MergedModule> {
        self.devices.get(device_id).and_then(|m| m.get(module_id))
    }

    /// Every device's copy of one module.
    pub fn modules_of(&self, module_id: &SyncModuleId) -> Vec<(&SyncDeviceId, &MergedModule)> {
        self.devices
            .iter()
            .filter_map(|(device_id, modules)| modules.get(module_id).map(|m| (device_id, m)))
            .collect()
    }
}

/// Fans operations out to a set of connectors and merges their data.
#[derive(Default)]
pub struct SyncAggregator {
    connectors: Vec<Arc<dyn SyncConnector>>,
}

impl SyncAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, connector: Arc<dyn SyncConnector>) {
        self.connectors.push(connector);
    }

    pub fn connectors(&self) -> &[Arc<dyn SyncConnector>] {
        &self.connectors
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Reads all connectors concurrently.
    pub async fn read_all(&self) {
        join_all(self.connectors.iter().map(|c| c.read())).await;
    }

    /// Queues `data` on every connector.
    ///
    /// Returns the first enqueue error after trying all connectors.
    pub async fn write_all(&self, data: SyncWrite) -> Result<(), ConnectorError> {
        let mut first_error = None;
        for connector in &self.connectors {
            if let Err(e) = connector.write(data.clone()).await {
                tracing::warn!("{}: write rejected: {}", connector.identifier(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Waits until every connector has processed its queued writes.
    pub async fn flush_all(&self) -> Result<(), ConnectorError> {
        for result in join_all(self.connectors.iter().map(|c| c.flush())).await {
            result?;
        }
        Ok(())
    }

    /// Wipes every connector, stopping at the first failure.
    pub async fn wipe_all(&self) -> Result<(), ConnectorError> {
        for connector in &self.connectors {
            connector.wipe().await?;
        }
        Ok(())
    }

    /// Current state of each connector.
    pub fn states(&self) -> Vec<(ConnectorId, ConnectorState)> {
        self.connectors
            .iter()
            .map(|c| (c.identifier().clone(), c.state().borrow().clone()))
            .collect()
    }

    /// Merges the latest snapshots of all connectors.
    ///
    /// Connectors that have not completed a read yet are ignored. On equal
    /// `modified_at` the connector added first wins.
    pub fn merged(&self) -> MergedData {
        let mut merged = MergedData::default();

        for connector in &self.connectors {
            let snapshot = match connector.data().borrow().clone() {
                Some(snapshot) => snapshot,
                None => continue,
            };

            for device in snapshot.devices {
                let modules = merged.devices.entry(device.device_id).or_default();

                for module in device.modules {
                    let newer = modules
                        .get(&module.module_id)
                        .map_or(true, |existing| module.modified_at > existing.data.modified_at);

                    if newer {
                        modules.insert(
                            module.module_id.clone(),
                            MergedModule {
                                source: connector.identifier().clone(),
                                data: module,
                            },
                        );
                    }
                }
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorKind, DriveConnector, DriveOptions};
    use crate::models::{DeviceData, SyncRead};
    use crate::storage::FsStorage;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use tempfile::TempDir;
    use tokio::sync::watch;

    /// Connector serving a fixed snapshot.
    struct StaticConnector {
        id: ConnectorId,
        state_tx: watch::Sender<ConnectorState>,
        data_tx: watch::Sender<Option<SyncRead>>,
    }

    impl StaticConnector {
        fn new(name: &str, snapshot: Option<SyncRead>) -> Arc<Self> {
            Arc::new(Self {
                id: ConnectorId::new(ConnectorKind::Folder, name),
                state_tx: watch::channel(ConnectorState::default()).0,
                data_tx: watch::channel(snapshot).0,
            })
        }
    }

    #[async_trait]
    impl SyncConnector for StaticConnector {
        fn identifier(&self) -> &ConnectorId {
            &self.id
        }

        fn state(&self) -> watch::Receiver<ConnectorState> {
            self.state_tx.subscribe()
        }

        fn data(&self) -> watch::Receiver<Option<SyncRead>> {
            self.data_tx.subscribe()
        }

        async fn read(&self) {}

        async fn write(&self, _data: SyncWrite) -> Result<(), ConnectorError> {
            Ok(())
        }

        async fn flush(&self) -> Result<(), ConnectorError> {
            Ok(())
        }

        async fn wipe(&self) -> Result<(), ConnectorError> {
            Ok(())
        }
    }

    fn snapshot(device: &str, payload: &str, modified_at: DateTime<Utc>) -> SyncRead {
        SyncRead::new(vec![DeviceData::new(
            SyncDeviceId::new(device).unwrap(),
            vec![ModuleData::new(
                SyncModuleId::power(),
                modified_at - Duration::hours(1),
                modified_at,
                payload.as_bytes().to_vec(),
            )],
        )])
    }

    #[test]
    fn test_newest_module_wins() {
        let now = Utc::now();
        let mut aggregator = SyncAggregator::new();
        aggregator.add(StaticConnector::new(
            "old",
            Some(snapshot("dev-A", "full", now - Duration::minutes(5))),
        ));
        aggregator.add(StaticConnector::new("new", Some(snapshot("dev-A", "charging", now))));

        let merged = aggregator.merged();
        let module = merged
            .module(&SyncDeviceId::new("dev-A").unwrap(), &SyncModuleId::power())
            .unwrap();
        assert_eq!(module.data.payload, b"charging");
        assert_eq!(module.source.account, "new");
    }

    #[test]
    fn test_tie_keeps_first_connector() {
        let now = Utc::now();
        let mut aggregator = SyncAggregator::new();
        aggregator.add(StaticConnector::new("first", Some(snapshot("dev-A", "a", now))));
        aggregator.add(StaticConnector::new("second", Some(snapshot("dev-A", "b", now))));

        let merged = aggregator.merged();
        let module = merged
            .module(&SyncDeviceId::new("dev-A").unwrap(), &SyncModuleId::power())
            .unwrap();
        assert_eq!(module.source.account, "first");
    }

    #[test]
    fn test_devices_from_all_connectors_are_combined() {
        let now = Utc::now();
        let mut aggregator = SyncAggregator::new();
        aggregator.add(StaticConnector::new("one", Some(snapshot("dev-A", "a", now))));
        aggregator.add(StaticConnector::new("two", Some(snapshot("dev-B", "b", now))));
        aggregator.add(StaticConnector::new("unread", None));

        let merged = aggregator.merged();
        assert_eq!(merged.devices.len(), 2);
        assert_eq!(merged.modules_of(&SyncModuleId::power()).len(), 2);
        assert_eq!(aggregator.states().len(), 3);
    }

    #[test]
    fn test_no_reads_yields_empty() {
        let mut aggregator = SyncAggregator::new();
        aggregator.add(StaticConnector::new("unread", None));
        assert!(aggregator.merged().is_empty());
    }

    #[tokio::test]
    async fn test_write_all_and_read_back() {
        let temp = TempDir::new().unwrap();
        let device = SyncDeviceId::new("dev-A").unwrap();

        let mut aggregator = SyncAggregator::new();
        for name in ["one", "two"] {
            let storage = FsStorage::new(temp.path().join(name));
            aggregator.add(Arc::new(DriveConnector::folder(
                storage,
                device.clone(),
                DriveOptions::default(),
            )));
        }

        aggregator
            .write_all(SyncWrite::new(device.clone()).with_module(SyncModuleId::power(), "full"))
            .await
            .unwrap();
        aggregator.flush_all().await.unwrap();
        aggregator.read_all().await;

        let merged = aggregator.merged();
        assert_eq!(
            merged.module(&device, &SyncModuleId::power()).unwrap().data.payload,
            b"full"
        );
        for (_, state) in aggregator.states() {
            assert!(state.last_read_at.is_some());
            assert!(state.stats.is_some());
        }

        aggregator.wipe_all().await.unwrap();
        aggregator.read_all().await;
        assert!(aggregator.merged().is_empty());
    }
}
