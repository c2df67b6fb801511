use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::StorageError;
use crate::storage::Storage;

pub const DEFAULT_NAMESPACE: &str = "bizu_cache:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    /// Write time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Time-to-live in milliseconds.
    pub ttl: i64,
}

#[derive(Deserialize)]
struct EntryMeta {
    timestamp: i64,
    ttl: i64,
}

fn is_expired(now: i64, timestamp: i64, ttl: i64) -> bool {
    // timestamp and ttl come from storage that may have been edited by hand
    now.saturating_sub(timestamp) > ttl
}

/// Namespaced TTL wrapper over a [`Storage`].
#[derive(Clone)]
pub struct TtlCache {
    storage: Arc<dyn Storage>,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("namespace", &self.namespace)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TtlCache {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_namespace(storage, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(storage: Arc<dyn Storage>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Stores `value` for `ttl`. A full storage is swept of expired entries
    /// and the write retried once; a second failure drops the write.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let entry = CacheEntry {
            value,
            timestamp: self.clock.now_ms(),
            ttl: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, key, "failed to serialize cache entry");
                return false;
            }
        };
        let full_key = self.full_key(key);
        match self.storage.set(&full_key, raw.clone()).await {
            Ok(()) => true,
            Err(StorageError::QuotaExceeded { .. }) => {
                let evicted = self.clear_expired().await;
                debug!(evicted, key, "storage full, retrying cache write");
                match self.storage.set(&full_key, raw).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, key, "dropping cache write");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, key, "dropping cache write");
                false
            }
        }
    }

    /// Returns the payload if present, parseable and fresh. Corrupt and
    /// expired entries are deleted on the way.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let raw = self.storage.get(&full_key).await?;
        let entry = match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, key, "removing corrupt cache entry");
                self.storage.remove(&full_key).await;
                return None;
            }
        };
        if is_expired(self.clock.now_ms(), entry.timestamp, entry.ttl) {
            debug!(key, "cache entry expired");
            self.storage.remove(&full_key).await;
            return None;
        }
        Some(entry.value)
    }

    pub async fn has(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).await.is_some()
    }

    pub async fn remove(&self, key: &str) {
        self.storage.remove(&self.full_key(key)).await;
    }

    /// Drops every entry in this namespace.
    pub async fn clear(&self) {
        for key in self.namespaced_keys().await {
            self.storage.remove(&key).await;
        }
    }

    /// Sweeps expired and corrupt entries from this namespace and returns how
    /// many were removed.
    pub async fn clear_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;
        for key in self.namespaced_keys().await {
            let Some(raw) = self.storage.get(&key).await else {
                continue;
            };
            let stale = match serde_json::from_str::<EntryMeta>(&raw) {
                Ok(meta) => is_expired(now, meta.timestamp, meta.ttl),
                Err(_) => true,
            };
            if stale {
                self.storage.remove(&key).await;
                removed += 1;
            }
        }
        removed
    }

    async fn namespaced_keys(&self) -> Vec<String> {
        self.storage
            .keys()
            .await
            .into_iter()
            .filter(|k| k.starts_with(&self.namespace))
            .collect()
    }
}
