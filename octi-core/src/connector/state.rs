//! Connector health tracking.
//!
//! [`StateTracker`] owns the single [`ConnectorState`] of a connector and
//! publishes every change on a `watch` channel, so subscribers always see
//! the latest value immediately.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Remote storage usage captured during a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub timestamp: DateTime<Utc>,
    pub storage_used: u64,
    pub storage_total: u64,
}

impl StorageStats {
    pub fn storage_free(&self) -> u64 {
        self.storage_total.saturating_sub(self.storage_used)
    }

    /// Used share of the total, in `0.0..=1.0`.
    pub fn usage_ratio(&self) -> f64 {
        if self.storage_total == 0 {
            return 1.0;
        }
        (self.storage_used as f64 / self.storage_total as f64).min(1.0)
    }
}

/// Health of one connector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorState {
    /// Reads currently in flight.
    pub read_actions: usize,
    /// Writes (including wipes) currently in flight.
    pub write_actions: usize,
    pub last_read_at: Option<DateTime<Utc>>,
    pub last_write_at: Option<DateTime<Utc>>,
    /// Error of the most recent failed read, cleared by the next successful one.
    pub last_error: Option<String>,
    pub stats: Option<StorageStats>,
}

impl ConnectorState {
    pub fn is_reading(&self) -> bool {
        self.read_actions > 0
    }

    pub fn is_writing(&self) -> bool {
        self.write_actions > 0
    }

    pub fn is_busy(&self) -> bool {
        self.is_reading() || self.is_writing()
    }
}

/// Kind of action wrapped by an [`ActionGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Read,
    Write,
}

/// Owner of a connector's [`ConnectorState`].
///
/// Cloning is cheap; all clones update the same state.
#[derive(Debug, Clone)]
pub struct StateTracker {
    tx: Arc<watch::Sender<ConnectorState>>,
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectorState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Subscribes to state changes. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<ConnectorState> {
        self.tx.subscribe()
    }

    /// Returns a copy of the current state.
    pub fn current(&self) -> ConnectorState {
        self.tx.borrow().clone()
    }

    /// Applies `f` as a single atomic read-modify-write.
    pub fn update(&self, f: impl FnOnce(&mut ConnectorState)) {
        self.tx.send_modify(f);
    }

    /// Marks the start of an action. The returned guard marks its end when
    /// dropped, which also covers failures and cancellation.
    pub fn begin(&self, kind: ActionKind) -> ActionGuard {
        self.update(|state| match kind {
            ActionKind::Read => state.read_actions += 1,
            ActionKind::Write => state.write_actions += 1,
        });

        ActionGuard {
            tracker: self.clone(),
            kind,
        }
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps an action counted while alive.
#[derive(Debug)]
pub struct ActionGuard {
    tracker: StateTracker,
    kind: ActionKind,
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        let now = Utc::now();
        let kind = self.kind;
        self.tracker.update(|state| match kind {
            ActionKind::Read => {
                state.read_actions = state.read_actions.saturating_sub(1);
                state.last_read_at = Some(now);
            }
            ActionKind::Write => {
                state.write_actions = state.write_actions.saturating_sub(1);
                state.last_write_at = Some(now);
            }
        });
    }
}
