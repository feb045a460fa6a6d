//! Removes rendezvous records left behind by crashed or abandoned sessions.

use std::time::Duration;

use roulette_core::paths;
use serde_json::Value;
use tracing::{info, warn};

use crate::store::RendezvousStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub rooms_removed: usize,
    pub waiting_removed: usize,
    pub failures: usize,
}

/// A record is stale when it lacks a numeric `createdAt` or is older than `threshold`.
pub fn is_stale(record: &Value, now_ms: u64, threshold: Duration) -> bool {
    match record.get("createdAt").and_then(Value::as_u64) {
        Some(created_at) => u128::from(now_ms.saturating_sub(created_at)) > threshold.as_millis(),
        None => true,
    }
}

/// Scan rooms and waiting rooms once, deleting stale entries.
///
/// Best-effort: a failed read skips that collection, a failed removal only
/// counts as a failure. Never returns an error.
pub async fn reap_stale_records(
    store: &dyn RendezvousStore,
    now_ms: u64,
    threshold: Duration,
) -> ReapReport {
    let mut report = ReapReport::default();

    let (removed, failed) = reap_collection(store, paths::ROOMS, now_ms, threshold).await;
    report.rooms_removed = removed;
    report.failures += failed;

    let (removed, failed) = reap_collection(store, paths::WAITING_ROOMS, now_ms, threshold).await;
    report.waiting_removed = removed;
    report.failures += failed;

    if report.rooms_removed + report.waiting_removed > 0 {
        info!(
            "Reaped {} stale rooms and {} stale waiting rooms",
            report.rooms_removed, report.waiting_removed
        );
    }
    report
}

async fn reap_collection(
    store: &dyn RendezvousStore,
    collection: &str,
    now_ms: u64,
    threshold: Duration,
) -> (usize, usize) {
    let records = match store.get(collection).await {
        Ok(Some(Value::Object(records))) => records,
        Ok(_) => return (0, 0),
        Err(e) => {
            warn!("Could not scan '{}' for stale records: {}", collection, e);
            return (0, 1);
        }
    };

    let mut removed = 0;
    let mut failed = 0;
    for (key, record) in records {
        if !is_stale(&record, now_ms, threshold) {
            continue;
        }
        let path = format!("{collection}/{key}");
        match store.remove(&path).await {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!("Failed to remove stale record '{}': {}", path, e);
                failed += 1;
            }
        }
    }
    (removed, failed)
}
