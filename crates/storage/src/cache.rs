// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed TTL cache over a [`StateStore`].
//!
//! Reads never fail: a missing, expired, corrupt, or unreadable entry is a
//! miss, and expired or corrupt entries are evicted on the spot. Eviction
//! takes the write lock and only removes the bytes that were read, so a
//! write racing a stale read survives it. Writes surface [`CacheError`].
//!
//! Writing a single space, notebook, or document also patches the cached
//! list that contains it. Patching keeps the list's own `cached_at_ms`, so a
//! patch never extends how long the list is considered fresh.

use crate::entry::{CacheEntry, TtlPolicy};
use crate::keys;
use crate::store::{StateStore, StoreError};
use nbr_core::{
    Clock, DocumentId, DocumentSummary, Environment, NotebookSummary, RecentItem, RecentList,
    ResourceKind, RuntimeId, RuntimeRecord, Space, SpaceId,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What to drop in [`CacheLayer::invalidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidateScope {
    All,
    /// Spaces list and individual spaces
    Spaces,
    /// Notebook and document lists of one space
    SpaceItems(SpaceId),
    /// Cached notebook/document content
    Content,
    Environments,
    Runtimes,
}

impl InvalidateScope {
    fn matches(&self, key: &str) -> bool {
        match self {
            Self::All => key.starts_with(keys::CACHE_PREFIX),
            Self::Spaces => key == keys::SPACES || key.starts_with(keys::SPACE_PREFIX),
            Self::SpaceItems(space) => {
                key == keys::notebooks(space) || key == keys::documents(space)
            }
            Self::Content => key.starts_with(keys::CONTENT_PREFIX),
            Self::Environments => key == keys::ENVIRONMENTS,
            Self::Runtimes => key.starts_with(keys::RUNTIME_PREFIX),
        }
    }
}

/// Process-local cache counters, reset by [`CacheLayer::clear_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub corrupted: u64,
    pub writes: u64,
    /// Live cached runtime records
    pub runtimes: usize,
    /// Length of the recent items list
    pub recent: usize,
}

enum Lookup<T> {
    Hit(CacheEntry<T>),
    Miss,
    /// Raw bytes of the stale entry, for compare-and-remove
    Expired(String),
    Corrupt(String),
}

impl<T> Lookup<T> {
    fn stale(&self) -> Option<&str> {
        match self {
            Self::Expired(raw) | Self::Corrupt(raw) => Some(raw),
            Self::Hit(_) | Self::Miss => None,
        }
    }
}

pub struct CacheLayer<S: StateStore, C: Clock> {
    store: Arc<S>,
    clock: C,
    ttl: TtlPolicy,
    stats: Mutex<CacheStats>,
    /// Serializes read-modify-write sequences (list patches, registry, recents)
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: StateStore, C: Clock> CacheLayer<S, C> {
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self::with_policy(store, clock, TtlPolicy::default())
    }

    pub fn with_policy(store: Arc<S>, clock: C, ttl: TtlPolicy) -> Self {
        Self {
            store,
            clock,
            ttl,
            stats: Mutex::new(CacheStats::default()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ── Spaces ──────────────────────────────────────────────────────────

    pub async fn spaces(&self) -> Option<Vec<Space>> {
        self.get(keys::SPACES).await
    }

    pub async fn set_spaces(&self, spaces: Vec<Space>) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.put(keys::SPACES, &spaces, self.ttl.spaces).await
    }

    pub async fn space(&self, id: &SpaceId) -> Option<Space> {
        self.get(&keys::space(id)).await
    }

    pub async fn set_space(&self, space: Space) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.put(&keys::space(&space.id), &space, self.ttl.spaces).await?;
        self.patch_list(keys::SPACES, |list: &mut Vec<Space>| upsert(list, space, |s| &s.id))
            .await
    }

    pub async fn remove_space(&self, id: &SpaceId) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.delete(&keys::space(id)).await?;
        self.patch_list(keys::SPACES, |list: &mut Vec<Space>| list.retain(|s| &s.id != id)).await
    }

    // ── Notebooks ───────────────────────────────────────────────────────

    pub async fn notebooks(&self, space_id: &SpaceId) -> Option<Vec<NotebookSummary>> {
        self.get(&keys::notebooks(space_id)).await
    }

    pub async fn set_notebooks(
        &self,
        space_id: &SpaceId,
        notebooks: Vec<NotebookSummary>,
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.put(&keys::notebooks(space_id), &notebooks, self.ttl.items).await
    }

    pub async fn notebook(&self, id: &DocumentId) -> Option<NotebookSummary> {
        self.get(&keys::notebook(id)).await
    }

    pub async fn set_notebook(&self, notebook: NotebookSummary) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.put(&keys::notebook(&notebook.id), &notebook, self.ttl.items).await?;
        let list_key = keys::notebooks(&notebook.space_id);
        self.patch_list(&list_key, |list: &mut Vec<NotebookSummary>| {
            upsert(list, notebook, |n| &n.id)
        })
        .await
    }

    pub async fn remove_notebook(
        &self,
        space_id: &SpaceId,
        id: &DocumentId,
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.delete(&keys::notebook(id)).await?;
        self.patch_list(&keys::notebooks(space_id), |list: &mut Vec<NotebookSummary>| {
            list.retain(|n| &n.id != id)
        })
        .await
    }

    // ── Documents ───────────────────────────────────────────────────────

    pub async fn documents(&self, space_id: &SpaceId) -> Option<Vec<DocumentSummary>> {
        self.get(&keys::documents(space_id)).await
    }

    pub async fn set_documents(
        &self,
        space_id: &SpaceId,
        documents: Vec<DocumentSummary>,
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.put(&keys::documents(space_id), &documents, self.ttl.items).await
    }

    pub async fn document(&self, id: &DocumentId) -> Option<DocumentSummary> {
        self.get(&keys::document(id)).await
    }

    pub async fn set_document(&self, document: DocumentSummary) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.put(&keys::document(&document.id), &document, self.ttl.items).await?;
        let list_key = keys::documents(&document.space_id);
        self.patch_list(&list_key, |list: &mut Vec<DocumentSummary>| {
            upsert(list, document, |d| &d.id)
        })
        .await
    }

    pub async fn remove_document(
        &self,
        space_id: &SpaceId,
        id: &DocumentId,
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.delete(&keys::document(id)).await?;
        self.patch_list(&keys::documents(space_id), |list: &mut Vec<DocumentSummary>| {
            list.retain(|d| &d.id != id)
        })
        .await
    }

    // ── Content ─────────────────────────────────────────────────────────

    pub async fn content<T: DeserializeOwned>(&self, kind: ResourceKind, id: &str) -> Option<T> {
        self.get(&keys::content(kind, id)).await
    }

    pub async fn set_content<T: Serialize>(
        &self,
        kind: ResourceKind,
        id: &str,
        content: &T,
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.put(&keys::content(kind, id), content, self.ttl.content).await
    }

    // ── Environments ────────────────────────────────────────────────────

    pub async fn environments(&self) -> Option<Vec<Environment>> {
        self.get(keys::ENVIRONMENTS).await
    }

    pub async fn set_environments(&self, environments: Vec<Environment>) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.put(keys::ENVIRONMENTS, &environments, self.ttl.environments).await
    }

    // ── Runtimes ────────────────────────────────────────────────────────

    pub async fn runtime(&self, id: &RuntimeId) -> Option<RuntimeRecord> {
        self.get(&keys::runtime(id)).await
    }

    pub async fn set_runtime(&self, record: &RuntimeRecord) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.put(&keys::runtime(&record.pod_name), record, self.ttl.runtime).await
    }

    pub async fn remove_runtime(&self, id: &RuntimeId) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.delete(&keys::runtime(id)).await
    }

    /// Every live cached runtime record. Expired or corrupt records found
    /// along the way are evicted.
    pub async fn list_runtimes(&self) -> Vec<RuntimeRecord> {
        let _guard = self.write_lock.lock().await;
        let registry = self.registry().await;
        let mut records = Vec::new();
        let mut stale = Vec::new();
        for key in registry.iter().filter(|k| k.starts_with(keys::RUNTIME_PREFIX)) {
            let lookup = self.lookup::<RuntimeRecord>(key).await;
            if let Some(raw) = lookup.stale() {
                self.evict_stale(key, raw).await;
            }
            match lookup {
                Lookup::Hit(entry) => records.push(entry.payload),
                _ => stale.push(key.clone()),
            }
        }
        if !stale.is_empty() {
            if let Err(e) = self.unregister(&stale).await {
                tracing::warn!(error = %e, "failed to prune runtime index");
            }
        }
        records
    }

    // ── Recent items ────────────────────────────────────────────────────

    /// Record that a resource was opened; most recent first, unique by id.
    pub async fn add_recent(
        &self,
        kind: ResourceKind,
        id: impl Into<String>,
        name: Option<String>,
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        let mut list = self.load_recent().await;
        list.push(RecentItem { kind, id: id.into(), name, accessed_at_ms: self.clock.epoch_ms() });
        self.store.set(keys::RECENT, serde_json::to_string(&list)?).await?;
        Ok(())
    }

    pub async fn recent(&self) -> Vec<RecentItem> {
        self.load_recent().await.into_vec()
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    pub async fn invalidate(&self, scope: InvalidateScope) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        let registry = self.registry().await;
        let doomed: Vec<String> = registry.into_iter().filter(|k| scope.matches(k)).collect();
        for key in &doomed {
            self.store.remove(key).await?;
        }
        if scope == InvalidateScope::All {
            self.store.remove(keys::REGISTRY).await?;
        } else {
            self.unregister(&doomed).await?;
        }
        tracing::debug!(?scope, removed = doomed.len(), "cache invalidated");
        Ok(())
    }

    /// Drop every cache entry and the recent list, and reset counters.
    ///
    /// Bindings and terminated flags are not cache state and are kept.
    pub async fn clear_all(&self) -> Result<(), CacheError> {
        self.invalidate(InvalidateScope::All).await?;
        let _guard = self.write_lock.lock().await;
        self.store.remove(keys::RECENT).await?;
        *self.stats.lock() = CacheStats::default();
        Ok(())
    }

    pub async fn statistics(&self) -> CacheStats {
        let runtimes = self.list_runtimes().await.len();
        let recent = self.load_recent().await.len();
        let mut stats = self.stats.lock().clone();
        stats.runtimes = runtimes;
        stats.recent = recent;
        stats
    }

    // ── Internals ───────────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let lookup = self.lookup(key).await;
        if let Some(raw) = lookup.stale() {
            let _guard = self.write_lock.lock().await;
            self.evict_stale(key, raw).await;
        }
        let mut stats = self.stats.lock();
        match lookup {
            Lookup::Hit(entry) => {
                stats.hits += 1;
                Some(entry.payload)
            }
            Lookup::Miss => {
                stats.misses += 1;
                None
            }
            Lookup::Expired(_) => {
                stats.misses += 1;
                stats.expired += 1;
                None
            }
            Lookup::Corrupt(_) => {
                stats.misses += 1;
                stats.corrupted += 1;
                None
            }
        }
    }

    /// Read without touching counters or evicting.
    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Lookup::Miss,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed");
                return Lookup::Miss;
            }
        };
        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt cache entry");
                return Lookup::Corrupt(raw);
            }
        };
        if entry.is_expired(self.clock.epoch_ms()) {
            tracing::debug!(key, "cache entry expired");
            return Lookup::Expired(raw);
        }
        Lookup::Hit(entry)
    }

    /// Remove `key` only if it still holds `stale`. Caller holds `write_lock`.
    ///
    /// Eviction leaves the registry alone; enumeration prunes stale keys.
    async fn evict_stale(&self, key: &str, stale: &str) {
        match self.store.get(key).await {
            Ok(Some(current)) if current == stale => {
                if let Err(e) = self.store.remove(key).await {
                    tracing::warn!(key, error = %e, "failed to evict cache entry");
                }
            }
            Ok(_) => tracing::debug!(key, "entry rewritten since read, not evicting"),
            Err(e) => tracing::warn!(key, error = %e, "cache read failed, not evicting"),
        }
    }

    /// Write a fresh entry. Caller holds `write_lock`.
    async fn put<T: Serialize>(
        &self,
        key: &str,
        payload: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, payload, self.clock.epoch_ms(), ttl);
        self.store.set(key, serde_json::to_string(&entry)?).await?;
        self.register(key).await?;
        self.stats.lock().writes += 1;
        Ok(())
    }

    /// Remove an entry and its registry slot. Caller holds `write_lock`.
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key).await?;
        self.unregister(&[key.to_string()]).await
    }

    /// Apply `edit` to a cached list if it is present and fresh, keeping its
    /// original timestamp and TTL. Caller holds `write_lock`.
    async fn patch_list<T, F>(&self, key: &str, edit: F) -> Result<(), CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>),
    {
        let mut entry = match self.lookup::<Vec<T>>(key).await {
            Lookup::Hit(entry) => entry,
            Lookup::Expired(raw) | Lookup::Corrupt(raw) => {
                self.evict_stale(key, &raw).await;
                return Ok(());
            }
            Lookup::Miss => return Ok(()),
        };
        edit(&mut entry.payload);
        self.store.set(key, serde_json::to_string(&entry)?).await?;
        self.stats.lock().writes += 1;
        Ok(())
    }

    async fn registry(&self) -> BTreeSet<String> {
        match self.store.get(keys::REGISTRY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "corrupt cache registry, resetting");
                BTreeSet::new()
            }),
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                tracing::warn!(error = %e, "cache registry read failed");
                BTreeSet::new()
            }
        }
    }

    async fn register(&self, key: &str) -> Result<(), CacheError> {
        let mut registry = self.registry().await;
        if registry.insert(key.to_string()) {
            self.store.set(keys::REGISTRY, serde_json::to_string(&registry)?).await?;
        }
        Ok(())
    }

    async fn unregister(&self, doomed: &[String]) -> Result<(), CacheError> {
        let mut registry = self.registry().await;
        let before = registry.len();
        for key in doomed {
            registry.remove(key);
        }
        if registry.len() != before {
            self.store.set(keys::REGISTRY, serde_json::to_string(&registry)?).await?;
        }
        Ok(())
    }

    async fn load_recent(&self) -> RecentList {
        match self.store.get(keys::RECENT).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "corrupt recent list, resetting");
                RecentList::new()
            }),
            Ok(None) => RecentList::new(),
            Err(e) => {
                tracing::warn!(error = %e, "recent list read failed");
                RecentList::new()
            }
        }
    }
}

/// Replace the item with the same id, or append it.
fn upsert<T, K: PartialEq + ?Sized>(list: &mut Vec<T>, item: T, id: impl Fn(&T) -> &K) {
    match list.iter().position(|existing| id(existing) == id(&item)) {
        Some(index) => list[index] = item,
        None => list.push(item),
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
