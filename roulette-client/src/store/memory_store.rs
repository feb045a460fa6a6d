use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use roulette_core::utils::now_millis;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::store::{RendezvousStore, StoreError, StoreEvent, Subscription};

enum WatchKind {
    Value { last: Option<Value> },
    Children { seen: HashSet<String> },
}

struct Watcher {
    path: Vec<String>,
    kind: WatchKind,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

impl Watcher {
    /// Push whatever changed since the last delivery. `Err` means the subscriber is gone.
    fn deliver(&mut self, current: Option<&Value>) -> Result<(), ()> {
        match &mut self.kind {
            WatchKind::Value { last } => {
                if last.as_ref() == current {
                    return Ok(());
                }
                *last = current.cloned();
                self.tx
                    .send(StoreEvent::Value(current.cloned()))
                    .map_err(|_| ())
            }
            WatchKind::Children { seen } => {
                let Some(Value::Object(children)) = current else {
                    seen.clear();
                    return Ok(());
                };
                seen.retain(|key| children.contains_key(key));
                for (key, value) in children {
                    if seen.insert(key.clone()) {
                        self.tx
                            .send(StoreEvent::ChildAdded {
                                key: key.clone(),
                                value: value.clone(),
                            })
                            .map_err(|_| ())?;
                    }
                }
                Ok(())
            }
        }
    }
}

struct Backend {
    tree: Mutex<Value>,
    watchers: DashMap<u64, Watcher>,
    next_watcher: AtomicU64,
    next_key: AtomicU64,
}

impl Backend {
    /// Notify every watcher whose path overlaps one of `changed`. Call with the tree locked.
    fn notify(&self, tree: &Value, changed: &[Vec<String>]) {
        let mut gone = Vec::new();
        for mut entry in self.watchers.iter_mut() {
            if !changed.iter().any(|path| overlaps(&entry.path, path)) {
                continue;
            }
            let current = lookup(tree, &entry.path);
            if entry.deliver(current).is_err() {
                gone.push(*entry.key());
            }
        }
        for id in gone {
            self.watchers.remove(&id);
        }
    }
}

/// Hooks registered by one client connection.
#[derive(Default)]
struct Connection {
    on_disconnect: Mutex<Vec<String>>,
}

/// In-process rendezvous store.
///
/// Every clone shares the same connection. [`MemoryStore::connect`] opens a new
/// connection to the same tree, which is how tests model separate browser tabs.
#[derive(Clone)]
pub struct MemoryStore {
    backend: Arc<Backend>,
    connection: Arc<Connection>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            backend: Arc::new(Backend {
                tree: Mutex::new(Value::Object(Map::new())),
                watchers: DashMap::new(),
                next_watcher: AtomicU64::new(1),
                next_key: AtomicU64::new(0),
            }),
            connection: Arc::new(Connection::default()),
        }
    }

    pub fn connect(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            connection: Arc::new(Connection::default()),
        }
    }

    /// Simulate an abrupt drop of this connection: run its on-disconnect removals.
    pub async fn disconnect(&self) {
        let paths: Vec<String> = self.connection.on_disconnect.lock().await.drain(..).collect();
        for path in paths {
            debug!("Running on-disconnect removal of '{}'", path);
            if let Err(e) = self.remove(&path).await {
                warn!("On-disconnect removal of '{}' failed: {}", path, e);
            }
        }
    }

    async fn commit(&self, writes: Vec<(Vec<String>, Value)>) {
        let mut tree = self.backend.tree.lock().await;
        let mut changed = Vec::with_capacity(writes.len());
        for (path, value) in writes {
            write_at(&mut tree, &path, value);
            changed.push(path);
        }
        self.backend.notify(&tree, &changed);
    }

    async fn watch(&self, path: &str, kind: WatchKind) -> Subscription {
        let segments = split(path);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = Watcher {
            path: segments,
            kind,
            tx,
        };

        let tree = self.backend.tree.lock().await;
        // Initial delivery happens under the lock so no commit slips in between.
        let _ = watcher.deliver(lookup(&tree, &watcher.path));
        if let WatchKind::Value { last } = &mut watcher.kind {
            if last.is_none() {
                let _ = watcher.tx.send(StoreEvent::Value(None));
            }
        }
        let id = self.backend.next_watcher.fetch_add(1, Ordering::Relaxed);
        self.backend.watchers.insert(id, watcher);
        drop(tree);

        let backend: Weak<Backend> = Arc::downgrade(&self.backend);
        Subscription::new(path, rx, move || {
            if let Some(backend) = backend.upgrade() {
                backend.watchers.remove(&id);
            }
        })
    }
}

#[async_trait]
impl RendezvousStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let tree = self.backend.tree.lock().await;
        Ok(lookup(&tree, &split(path)).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.commit(vec![(split(path), value)]).await;
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let base = split(path);
        let writes = fields
            .into_iter()
            .map(|(key, value)| {
                let mut full = base.clone();
                full.extend(split(&key));
                (full, value)
            })
            .collect();
        self.commit(writes).await;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.commit(vec![(split(path), Value::Null)]).await;
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let key = self.new_key();
        let mut full = split(path);
        full.push(key.clone());
        self.commit(vec![(full, value)]).await;
        Ok(key)
    }

    fn new_key(&self) -> String {
        let seq = self.backend.next_key.fetch_add(1, Ordering::Relaxed);
        format!("{:013}{:06}", now_millis(), seq % 1_000_000)
    }

    async fn watch_value(&self, path: &str) -> Result<Subscription, StoreError> {
        Ok(self.watch(path, WatchKind::Value { last: None }).await)
    }

    async fn watch_children(&self, path: &str) -> Result<Subscription, StoreError> {
        Ok(self
            .watch(
                path,
                WatchKind::Children {
                    seen: HashSet::new(),
                },
            )
            .await)
    }

    async fn remove_on_disconnect(&self, path: &str) -> Result<(), StoreError> {
        self.connection
            .on_disconnect
            .lock()
            .await
            .push(path.to_owned());
        Ok(())
    }
}

fn split(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

fn lookup<'a>(tree: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut node = tree;
    for segment in path {
        node = node.as_object()?.get(segment)?;
    }
    match node {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other),
    }
}

fn write_at(tree: &mut Value, path: &[String], value: Value) {
    if value.is_null() {
        if path.is_empty() {
            *tree = Value::Object(Map::new());
        } else {
            remove_at(tree, path);
        }
        return;
    }
    set_at(tree, path, strip_nulls(value));
}

fn set_at(node: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        set_at(child, rest, value);
    }
}

/// Remove `path` and prune parents left empty. Returns whether `node` is now empty.
fn remove_at(node: &mut Value, path: &[String]) -> bool {
    let Some((head, rest)) = path.split_first() else {
        return true;
    };
    let Value::Object(map) = node else {
        return false;
    };
    if rest.is_empty() {
        map.remove(head);
    } else if let Some(child) = map.get_mut(head) {
        if remove_at(child, rest) {
            map.remove(head);
        }
    }
    map.is_empty()
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}
