use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use roulette_client::store::{MemoryStore, RendezvousStore, StoreError, Subscription};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// [`MemoryStore`] wrapper with injectable failures and interference.
pub struct FlakyStore {
    inner: MemoryStore,
    failing_removals: Mutex<Vec<String>>,
    /// Path and the number of reads of it that still succeed.
    failing_read: Mutex<Option<(String, usize)>>,
    hijack_claims: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing_removals: Mutex::new(Vec::new()),
            failing_read: Mutex::new(None),
            hijack_claims: AtomicBool::new(false),
        }
    }

    pub async fn fail_removal_of(&self, path: &str) {
        self.failing_removals.lock().await.push(path.to_owned());
    }

    /// Let `successes` reads of `path` through, then fail every later one.
    pub async fn fail_reads_of(&self, path: &str, successes: usize) {
        *self.failing_read.lock().await = Some((path.to_owned(), successes));
    }

    /// Overwrite the joiner of every room claimed through this store, as a
    /// concurrent joiner winning the race would.
    pub fn hijack_claims(&self) {
        self.hijack_claims.store(true, Ordering::SeqCst);
    }

    async fn check_removal(&self, path: &str) -> Result<(), StoreError> {
        if self.failing_removals.lock().await.iter().any(|p| p == path) {
            return Err(StoreError::Unavailable(format!("injected failure removing '{path}'")));
        }
        Ok(())
    }

    async fn check_read(&self, path: &str) -> Result<(), StoreError> {
        let mut failing = self.failing_read.lock().await;
        match failing.as_mut() {
            Some((target, 0)) if target == path => {
                Err(StoreError::Unavailable(format!("injected failure reading '{path}'")))
            }
            Some((target, remaining)) if target == path => {
                *remaining -= 1;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RendezvousStore for FlakyStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.check_read(path).await?;
        self.inner.get(path).await
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.inner.set(path, value).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let claimed: Vec<String> = fields
            .keys()
            .filter(|key| key.ends_with("/joinerId"))
            .cloned()
            .collect();
        self.inner.update(path, fields).await?;
        if self.hijack_claims.load(Ordering::SeqCst) {
            for key in claimed {
                self.inner.set(&key, Value::String("rival".to_owned())).await?;
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.check_removal(path).await?;
        self.inner.remove(path).await
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        self.inner.push(path, value).await
    }

    fn new_key(&self) -> String {
        self.inner.new_key()
    }

    async fn watch_value(&self, path: &str) -> Result<Subscription, StoreError> {
        self.inner.watch_value(path).await
    }

    async fn watch_children(&self, path: &str) -> Result<Subscription, StoreError> {
        self.inner.watch_children(path).await
    }

    async fn remove_on_disconnect(&self, path: &str) -> Result<(), StoreError> {
        self.inner.remove_on_disconnect(path).await
    }
}
