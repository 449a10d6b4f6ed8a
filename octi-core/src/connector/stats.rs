//! Throttled storage statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::state::StorageStats;
use crate::storage::StorageBackend;

/// Minimum age of stats before a read fetches them again.
pub const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Returns true if `previous` is missing or at least `interval` old at `now`.
pub fn stats_due(previous: Option<&StorageStats>, now: DateTime<Utc>, interval: Duration) -> bool {
    let previous = match previous {
        Some(previous) => previous,
        None => return true,
    };

    let age = now.signed_duration_since(previous.timestamp);
    match age.to_std() {
        Ok(age) => age >= interval,
        // Timestamp in the future, the clock moved backwards
        Err(_) => true,
    }
}

/// Fetches fresh stats when due, otherwise carries `previous` forward.
///
/// A failed fetch is logged and keeps the previous value.
pub async fn refresh_stats(
    backend: &dyn StorageBackend,
    previous: Option<StorageStats>,
    interval: Duration,
) -> Option<StorageStats> {
    let now = Utc::now();
    if !stats_due(previous.as_ref(), now, interval) {
        return previous;
    }

    match backend.quota().await {
        Ok(quota) => {
            tracing::debug!("Storage stats: {}/{} bytes", quota.used, quota.total);
            Some(StorageStats {
                timestamp: now,
                storage_used: quota.used,
                storage_total: quota.total,
            })
        }
        Err(e) => {
            tracing::warn!("Failed to fetch storage stats: {}", e);
            previous
        }
    }
}
