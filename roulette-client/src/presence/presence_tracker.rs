use std::sync::Arc;
use std::time::Duration;

use roulette_core::utils::now_millis;
use roulette_core::{PeerId, PresenceRecord, paths};
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::{RendezvousStore, StoreError, encode};

/// Keeps `presence/{peerId}` fresh while the tab is open.
pub struct PresenceTracker {
    store: Arc<dyn RendezvousStore>,
    path: String,
    visible: watch::Sender<bool>,
    heartbeat: JoinHandle<()>,
}

impl PresenceTracker {
    /// Publish presence now, republish every `interval`, and have the store
    /// drop the record if this client disconnects abruptly.
    pub async fn start(
        store: Arc<dyn RendezvousStore>,
        peer_id: &PeerId,
        interval: Duration,
    ) -> Result<Self, StoreError> {
        let path = paths::presence(peer_id);

        publish(store.as_ref(), &path, true).await?;
        store.remove_on_disconnect(&path).await?;

        let (visible, visible_rx) = watch::channel(true);
        let heartbeat = tokio::spawn({
            let store = store.clone();
            let path = path.clone();
            async move {
                let mut ticker = tokio::time::interval(interval);
                // The first tick completes immediately and presence was just published.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    // A hidden tab stays offline until it is shown again.
                    if !*visible_rx.borrow() {
                        continue;
                    }
                    match publish(store.as_ref(), &path, true).await {
                        Ok(()) => debug!("Presence refreshed at '{}'", path),
                        Err(e) => warn!("Presence refresh failed for '{}': {}", path, e),
                    }
                }
            }
        });

        info!("Presence tracking started at '{}'", path);
        Ok(Self {
            store,
            path,
            visible,
            heartbeat,
        })
    }

    /// Tab shown or hidden.
    pub async fn set_visible(&self, visible: bool) -> Result<(), StoreError> {
        self.visible.send_replace(visible);
        if visible {
            return publish(self.store.as_ref(), &self.path, true).await;
        }
        let mut fields = Map::new();
        fields.insert("online".to_owned(), Value::Bool(false));
        fields.insert("lastSeen".to_owned(), json!(now_millis()));
        self.store.update(&self.path, fields).await
    }

    /// Stop the heartbeat and remove the presence record. Never fails.
    pub async fn stop(self) {
        self.heartbeat.abort();
        match self.store.remove(&self.path).await {
            Ok(()) => info!("Presence removed at '{}'", self.path),
            Err(e) => warn!("Failed to remove presence at '{}': {}", self.path, e),
        }
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        self.heartbeat.abort();
    }
}

async fn publish(store: &dyn RendezvousStore, path: &str, online: bool) -> Result<(), StoreError> {
    let record = PresenceRecord {
        online,
        last_seen: now_millis(),
    };
    store.set(path, encode(path, &record)?).await
}
