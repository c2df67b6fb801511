use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::StorageError;

/// String key/value store backing the TTL cache.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str);
    async fn keys(&self) -> Vec<String>;
}

type Entries = HashMap<String, String>;

fn used_bytes(entries: &Entries) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

fn check_quota(
    entries: &Entries,
    key: &str,
    value: &str,
    quota: Option<usize>,
) -> Result<(), StorageError> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let replaced = entries.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
    let used = used_bytes(entries) - replaced + key.len() + value.len();
    if used > quota {
        return Err(StorageError::QuotaExceeded { used, quota });
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Entries>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            inner: Arc::default(),
            quota: Some(quota),
        }
    }

    pub async fn used_bytes(&self) -> usize {
        used_bytes(&*self.inner.read().await)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        check_quota(&inner, key, &value, self.quota)?;
        inner.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    async fn keys(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

/// JSON-file backed storage, the on-disk counterpart of browser local storage.
#[derive(Debug, Clone)]
pub struct FileStorage {
    inner: Arc<RwLock<Entries>>,
    path: PathBuf,
    quota: Option<usize>,
}

impl FileStorage {
    /// Loads `path`, falling back to its `.json.tmp` sibling when the main
    /// file is corrupt, and to an empty store when neither is readable.
    pub async fn load_from(path: impl AsRef<Path>, quota: Option<usize>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Entries>(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "failed to parse storage file, trying tmp fallback");
                    match tokio::fs::read(path.with_extension("json.tmp")).await {
                        Ok(tmp_bytes) => serde_json::from_slice::<Entries>(&tmp_bytes).unwrap_or_default(),
                        Err(_) => Entries::default(),
                    }
                }
            },
            Err(_) => Entries::default(),
        };
        debug!(entries = entries.len(), path = %path.display(), "storage loaded");
        Self {
            inner: Arc::new(RwLock::new(entries)),
            path,
            quota,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        check_quota(&inner, key, &value, self.quota)?;
        let previous = inner.insert(key.to_owned(), value);
        if let Err(e) = self.persist(&inner).await {
            // keep memory and disk in agreement
            match previous {
                Some(old) => inner.insert(key.to_owned(), old),
                None => inner.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) {
        let mut inner = self.inner.write().await;
        if inner.remove(key).is_some() {
            if let Err(e) = self.persist(&inner).await {
                warn!(error = %e, path = %self.path.display(), "failed to persist storage after remove");
            }
        }
    }

    async fn keys(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}
