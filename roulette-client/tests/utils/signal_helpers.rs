use std::future::Future;
use std::time::Duration;

use roulette_client::store::RendezvousStore;
use roulette_core::RoomRecord;
use serde_json::Value;

/// Timeout for state transitions driven by store notifications (ms).
pub const STATE_TIMEOUT_MS: u64 = 3000;

/// Poll interval of [`wait_until`] (ms).
const POLL_INTERVAL_MS: u64 = 10;

/// Poll `check` until it holds or `timeout_ms` passes. Returns whether it held.
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    })
    .await
    .is_ok()
}

/// Number of direct children under `path`.
pub async fn child_count(store: &dyn RendezvousStore, path: &str) -> usize {
    match store.get(path).await {
        Ok(Some(Value::Object(children))) => children.len(),
        _ => 0,
    }
}

/// Every room record currently in the store, decoded.
pub async fn rooms(store: &dyn RendezvousStore) -> Vec<(String, RoomRecord)> {
    let Ok(Some(Value::Object(rooms))) = store.get("rooms").await else {
        return Vec::new();
    };
    rooms
        .into_iter()
        .filter_map(|(key, value)| serde_json::from_value(value).ok().map(|room| (key, room)))
        .collect()
}
