// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted string key-value stores.
//!
//! Values are caller-serialized JSON. Stores are last-write-wins; callers that
//! need read-modify-write atomicity serialize on their own.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Async persisted key-value store.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn has(&self, key: &str) -> Result<bool, StoreError>;
}

/// Process-local store, used in tests and when no state dir is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.values.lock().contains_key(key))
    }
}

/// Single JSON map file, rewritten atomically (temp file + rename) on every
/// mutation.
pub struct FileStore {
    path: PathBuf,
    values: tokio::sync::Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, creating it lazily on first write.
    ///
    /// An unreadable file is moved aside to `.bak` and the store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(values) => values,
                Err(e) => {
                    let bak = path.with_extension("bak");
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "corrupt state file, moving aside"
                    );
                    std::fs::rename(&path, &bak)?;
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values: tokio::sync::Mutex::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(values)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut values = self.values.lock().await;
        values.insert(key.to_string(), value);
        self.flush(&values).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().await;
        if values.remove(key).is_some() {
            self.flush(&values).await?;
        }
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.values.lock().await.contains_key(key))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
