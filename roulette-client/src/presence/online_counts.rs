use std::collections::HashSet;
use std::sync::Arc;

use roulette_core::{OnlineCounts, paths};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{RendezvousStore, StoreError, StoreEvent};

/// Online and waiting counts derived from the room collections.
///
/// `online` is the number of distinct peers appearing as creator or joiner in
/// either collection. `waiting` is the number of waiting-room entries.
pub fn count_online(rooms: &Value, waiting: &Value) -> OnlineCounts {
    let mut peers: HashSet<&str> = HashSet::new();

    for record in children(rooms).chain(children(waiting)) {
        for field in ["creatorId", "joinerId"] {
            if let Some(id) = record.get(field).and_then(Value::as_str) {
                peers.insert(id);
            }
        }
    }

    OnlineCounts {
        online: peers.len(),
        waiting: children(waiting).count(),
    }
}

fn children(collection: &Value) -> impl Iterator<Item = &Value> {
    collection.as_object().into_iter().flat_map(|map| map.values())
}

/// Recompute counts whenever either collection changes and forward them.
///
/// The task ends when the receiver is dropped or a subscription closes.
pub async fn watch_online_counts(
    store: Arc<dyn RendezvousStore>,
    counts_tx: mpsc::UnboundedSender<OnlineCounts>,
) -> Result<JoinHandle<()>, StoreError> {
    let mut rooms_sub = store.watch_value(paths::ROOMS).await?;
    let mut waiting_sub = store.watch_value(paths::WAITING_ROOMS).await?;

    Ok(tokio::spawn(async move {
        let mut rooms = Value::Null;
        let mut waiting = Value::Null;

        loop {
            let event = tokio::select! {
                event = rooms_sub.recv() => event.map(|e| (true, e)),
                event = waiting_sub.recv() => event.map(|e| (false, e)),
            };
            let Some((is_rooms, event)) = event else {
                warn!("Online counts subscription closed");
                break;
            };
            let StoreEvent::Value(value) = event else {
                continue;
            };
            let value = value.unwrap_or(Value::Null);
            if is_rooms {
                rooms = value;
            } else {
                waiting = value;
            }

            let counts = count_online(&rooms, &waiting);
            debug!("Online counts: {} online, {} waiting", counts.online, counts.waiting);
            if counts_tx.send(counts).is_err() {
                break;
            }
        }
    }))
}
