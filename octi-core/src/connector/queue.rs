//! Sequential write queue with retry.
//!
//! Any number of producers enqueue [`SyncWrite`]s; a single consumer task
//! persists them one at a time, in enqueue order. A failed write is retried
//! after a fixed delay until it succeeds, so every accepted write is
//! delivered at least once. Writes failing with a non-retryable error are
//! logged and dropped.
//!
//! The consumer runs on its own task: dropping the caller's future never
//! interrupts a write that has started.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::error::ConnectorError;
use crate::models::SyncWrite;

/// Delay between attempts of a failed write.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Performs the physical write of one queue item.
#[async_trait]
pub trait WriteHandler: Send + Sync + 'static {
    async fn persist(&self, data: &SyncWrite) -> Result<(), ConnectorError>;
}

enum QueueItem {
    Write(SyncWrite),
    /// Completed once every earlier item has been processed.
    Flush(oneshot::Sender<()>),
}

/// Handle to a running write queue.
///
/// The consumer task stops after draining the remaining items once the
/// queue handle is dropped.
#[derive(Debug)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<QueueItem>,
}

impl std::fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueItem::Write(data) => write!(f, "Write({})", data.device_id),
            QueueItem::Flush(_) => write!(f, "Flush"),
        }
    }
}

impl WriteQueue {
    /// Starts the consumer task. Must be called within a Tokio runtime.
    pub fn spawn<H: WriteHandler>(handler: Arc<H>, retry_delay: Duration, label: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(consume(rx, handler, retry_delay, label));
        Self { tx }
    }

    /// Adds a write to the end of the queue and returns immediately.
    pub fn enqueue(&self, data: SyncWrite) -> Result<(), ConnectorError> {
        self.tx
            .send(QueueItem::Write(data))
            .map_err(|_| ConnectorError::QueueClosed)
    }

    /// Waits until every write enqueued before this call has been processed.
    pub async fn flush(&self) -> Result<(), ConnectorError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(QueueItem::Flush(done_tx))
            .map_err(|_| ConnectorError::QueueClosed)?;
        done_rx.await.map_err(|_| ConnectorError::QueueClosed)
    }
}

async fn consume<H: WriteHandler>(
    mut rx: mpsc::UnboundedReceiver<QueueItem>,
    handler: Arc<H>,
    retry_delay: Duration,
    label: String,
) {
    tracing::debug!("{}: write queue started", label);

    while let Some(item) = rx.recv().await {
        let data = match item {
            QueueItem::Write(data) => data,
            QueueItem::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        let mut attempt = 1u32;
        loop {
            match handler.persist(&data).await {
                Ok(()) => {
                    tracing::debug!(
                        "{}: wrote {} module(s) for {} (attempt {})",
                        label,
                        data.modules.len(),
                        data.device_id,
                        attempt
                    );
                    break;
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        "{}: write attempt {} failed, retrying in {:?}: {}",
                        label,
                        attempt,
                        retry_delay,
                        e
                    );
                    tokio::time::sleep(retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("{}: dropping write for {}: {}", label, data.device_id, e);
                    break;
                }
            }
        }
    }

    tracing::debug!("{}: write queue stopped", label);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{SyncDeviceId, SyncModuleId};
    use crate::storage::{BackendError, RemotePath};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records persisted payloads; fails the first `failures` attempts.
    struct RecordingHandler {
        persisted: Mutex<Vec<Vec<u8>>>,
        attempts: AtomicUsize,
        failures: usize,
        error: fn() -> ConnectorError,
    }

    impl RecordingHandler {
        fn new(failures: usize) -> Arc<Self> {
            Self::with_error(failures, || {
                BackendError::Unavailable("offline".to_string()).into()
            })
        }

        fn with_error(failures: usize, error: fn() -> ConnectorError) -> Arc<Self> {
            Arc::new(Self {
                persisted: Mutex::new(Vec::new()),
                attempts: AtomicUsize::new(0),
                failures,
                error,
            })
        }

        fn persisted(&self) -> Vec<Vec<u8>> {
            self.persisted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WriteHandler for RecordingHandler {
        async fn persist(&self, data: &SyncWrite) -> Result<(), ConnectorError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err((self.error)());
            }
            let mut persisted = self.persisted.lock().unwrap();
            for module in &data.modules {
                persisted.push(module.payload.clone());
            }
            Ok(())
        }
    }

    fn write(payload: &str) -> SyncWrite {
        SyncWrite::new(SyncDeviceId::new("dev-A").unwrap())
            .with_module(SyncModuleId::power(), payload)
    }

    const SHORT_DELAY: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_writes_are_persisted_in_order() {
        let handler = RecordingHandler::new(0);
        let queue = WriteQueue::spawn(handler.clone(), SHORT_DELAY, "test".into());

        for i in 0..20 {
            queue.enqueue(write(&i.to_string())).unwrap();
        }
        queue.flush().await.unwrap();

        let expected: Vec<Vec<u8>> = (0..20).map(|i| i.to_string().into_bytes()).collect();
        assert_eq!(handler.persisted(), expected);
    }

    #[tokio::test]
    async fn test_failed_write_is_retried() {
        let handler = RecordingHandler::new(2);
        let queue = WriteQueue::spawn(handler.clone(), SHORT_DELAY, "test".into());

        queue.enqueue(write("full")).unwrap();
        queue.enqueue(write("charging")).unwrap();
        queue.flush().await.unwrap();

        assert_eq!(handler.attempts.load(Ordering::SeqCst), 4);
        assert_eq!(
            handler.persisted(),
            vec![b"full".to_vec(), b"charging".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_non_retryable_write_is_dropped() {
        let handler = RecordingHandler::with_error(1, || {
            BackendError::NotAFile(RemotePath::devices()).into()
        });
        let queue = WriteQueue::spawn(handler.clone(), SHORT_DELAY, "test".into());

        queue.enqueue(write("broken")).unwrap();
        queue.enqueue(write("next")).unwrap();
        queue.flush().await.unwrap();

        assert_eq!(handler.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(handler.persisted(), vec![b"next".to_vec()]);
    }

    #[tokio::test]
    async fn test_concurrent_producers() {
        let handler = RecordingHandler::new(0);
        let queue = Arc::new(WriteQueue::spawn(
            handler.clone(),
            SHORT_DELAY,
            "test".into(),
        ));

        let mut tasks = Vec::new();
        for producer in 0..8 {
            let queue = queue.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..10 {
                    queue.enqueue(write(&format!("{}-{}", producer, i))).unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        queue.flush().await.unwrap();

        let persisted = handler.persisted();
        assert_eq!(persisted.len(), 80);

        // Each producer's writes keep their relative order
        for producer in 0..8 {
            let prefix = format!("{}-", producer);
            let own: Vec<String> = persisted
                .iter()
                .map(|p| String::from_utf8(p.clone()).unwrap())
                .filter(|p| p.starts_with(&prefix))
                .collect();
            let expected: Vec<String> = (0..10).map(|i| format!("{}{}", prefix, i)).collect();
            assert_eq!(own, expected);
        }
    }

    #[tokio::test]
    async fn test_flush_on_empty_queue() {
        let queue = WriteQueue::spawn(RecordingHandler::new(0), SHORT_DELAY, "test".into());
        queue.flush().await.unwrap();
    }
}
