//! Read-through cache for chapter and verse payloads
//!
//! Payloads are static reference data, so entries never expire and are
//! never invalidated. The cache is purely an optimization: every failure
//! (unreadable store, corrupt entry, failed write) is logged and treated
//! as a miss, and the caller falls back to the network.

use crate::error::CacheError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Entity collection an entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Chapters,
    Verses,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Chapters => "chapters",
            Namespace::Verses => "verses",
        }
    }
}

/// Backing store for cached payloads.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>, CacheError>;
    async fn put(&self, namespace: Namespace, key: &str, payload: Value) -> Result<(), CacheError>;
}

/// One cached payload on disk.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    data: Value,
}

/// Cache store with one JSON file per entry: `{root}/{namespace}/{key}.json`.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn entry_path(&self, namespace: Namespace, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.root.join(namespace.as_str()).join(format!("{file}.json"))
    }
}

#[async_trait]
impl CacheStore for DiskCache {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>, CacheError> {
        let path = self.entry_path(namespace, key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredEntry = serde_json::from_slice(&bytes)?;
        if entry.key != key {
            // Two keys sanitized to the same file name.
            return Ok(None);
        }
        Ok(Some(entry.data))
    }

    async fn put(&self, namespace: Namespace, key: &str, payload: Value) -> Result<(), CacheError> {
        let path = self.entry_path(namespace, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let entry = StoredEntry {
            key: key.to_string(),
            data: payload,
        };
        let bytes = serde_json::to_vec(&entry)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// In-process cache store.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(Namespace, String), Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, namespace: Namespace, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(namespace, key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>, CacheError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&(namespace, key.to_string())).cloned())
    }

    async fn put(&self, namespace: Namespace, key: &str, payload: Value) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert((namespace, key.to_string()), payload);
        Ok(())
    }
}

/// Typed, failure-tolerant front end over a [`CacheStore`].
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    writes: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Cached payload for `key`, or `None` on a miss or any failure.
    pub async fn get<T: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<T> {
        let value = match self.store.get(namespace, key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(
                    "cache read failed for {}/{key}, falling back to network: {e}",
                    namespace.as_str()
                );
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("corrupt cache entry {}/{key}: {e}", namespace.as_str());
                None
            }
        }
    }

    /// Store `payload` under `key`. Returns whether the write succeeded.
    pub async fn put<T: Serialize>(&self, namespace: Namespace, key: &str, payload: &T) -> bool {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("cannot encode {}/{key} for the cache: {e}", namespace.as_str());
                return false;
            }
        };
        match self.store.put(namespace, key, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to cache {}/{key}: {e}", namespace.as_str());
                false
            }
        }
    }

    /// Return the cached payload for `key`, or run `fetcher`, return its
    /// result and write it to the cache in the background.
    pub async fn read_through<T, E, F, Fut>(
        &self,
        namespace: Namespace,
        key: &str,
        fetcher: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.read_through_if(namespace, key, fetcher, |_| true).await
    }

    /// Like [`Cache::read_through`], but only payloads accepted by `keep`
    /// are written back.
    pub async fn read_through_if<T, E, F, Fut>(
        &self,
        namespace: Namespace,
        key: &str,
        fetcher: F,
        keep: impl FnOnce(&T) -> bool,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(namespace, key).await {
            debug!("cache hit {}/{key}", namespace.as_str());
            return Ok(hit);
        }

        debug!("cache miss {}/{key}, fetching", namespace.as_str());
        let payload = fetcher().await?;
        if keep(&payload) {
            match serde_json::to_value(&payload) {
                Ok(value) => self.spawn_write(namespace, key.to_string(), value),
                Err(e) => warn!("cannot encode {}/{key} for the cache: {e}", namespace.as_str()),
            }
        }
        Ok(payload)
    }

    fn spawn_write(&self, namespace: Namespace, key: String, value: Value) {
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move {
            if let Err(e) = store.put(namespace, &key, value).await {
                warn!("failed to cache {}/{key}: {e}", namespace.as_str());
            }
        });
        let mut writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        writes.retain(|w| !w.is_finished());
        writes.push(handle);
    }

    /// Wait for every background write started so far.
    pub async fn settle(&self) {
        let pending: Vec<JoinHandle<()>> = {
            let mut writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
            writes.drain(..).collect()
        };
        for write in pending {
            let _ = write.await;
        }
    }
}
