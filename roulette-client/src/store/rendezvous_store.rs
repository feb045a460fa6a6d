use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to decode value at '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for '{path}': {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Change notification delivered to one subscriber, in commit order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Whole value at the watched path. `None` once the path no longer exists.
    Value(Option<Value>),
    /// A child appeared under the watched path. Each child is delivered once.
    ChildAdded { key: String, value: Value },
}

/// Live listener handle. Dropping or cancelling it unregisters the listener.
pub struct Subscription {
    path: String,
    rx: mpsc::UnboundedReceiver<StoreEvent>,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new<F>(path: impl Into<String>, rx: mpsc::UnboundedReceiver<StoreEvent>, cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            rx,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next notification, or `None` once the store side has gone away.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        self.rx.recv().await
    }

    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Shared real-time key/value tree used as the rendezvous point.
///
/// Paths are `/`-separated. `update` keys may themselves be paths relative to
/// `path`; a `null` value removes that child. All writes of one `update` are
/// committed atomically. No conditional write is offered.
#[async_trait]
pub trait RendezvousStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Append `value` under a fresh chronologically ordered key and return the key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Fresh chronologically ordered key, without writing anything.
    fn new_key(&self) -> String;

    /// Current value immediately, then the new value after every change.
    async fn watch_value(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Existing children immediately, then every child added later.
    async fn watch_children(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Ask the store to remove `path` when this client's connection drops.
    async fn remove_on_disconnect(&self, path: &str) -> Result<(), StoreError>;
}

pub async fn read<T: DeserializeOwned>(
    store: &dyn RendezvousStore,
    path: &str,
) -> Result<Option<T>, StoreError> {
    let Some(value) = store.get(path).await? else {
        return Ok(None);
    };
    decode(path, value).map(Some)
}

pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Decode {
        path: path.to_owned(),
        source,
    })
}

pub fn encode<T: Serialize>(path: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Encode {
        path: path.to_owned(),
        source,
    })
}
