// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted document → runtime bindings.
//!
//! The in-memory binding owns the connectivity handle; this is its durable
//! twin, read on startup to re-associate live runtimes with documents. All
//! bindings live in one map under [`keys::BINDINGS`].

use crate::keys;
use crate::store::{StateStore, StoreError};
use nbr_core::{DocumentId, RuntimeId};
use std::collections::BTreeMap;
use std::sync::Arc;

type BindingMap = BTreeMap<DocumentId, RuntimeId>;

pub struct BindingStore<S: StateStore> {
    store: Arc<S>,
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: StateStore> BindingStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, write_lock: tokio::sync::Mutex::new(()) }
    }

    pub async fn all(&self) -> Result<BindingMap, StoreError> {
        let Some(raw) = self.store.get(keys::BINDINGS).await? else {
            return Ok(BindingMap::new());
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(error = %e, "corrupt binding map, discarding");
                Ok(BindingMap::new())
            }
        }
    }

    pub async fn get(&self, document_id: &DocumentId) -> Result<Option<RuntimeId>, StoreError> {
        Ok(self.all().await?.remove(document_id))
    }

    /// Bind `document_id` to `runtime_id`, replacing any prior binding.
    pub async fn put(
        &self,
        document_id: &DocumentId,
        runtime_id: &RuntimeId,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.all().await?;
        map.insert(document_id.clone(), runtime_id.clone());
        self.save(&map).await
    }

    pub async fn remove(&self, document_id: &DocumentId) -> Result<Option<RuntimeId>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.all().await?;
        let removed = map.remove(document_id);
        if removed.is_some() {
            self.save(&map).await?;
        }
        Ok(removed)
    }

    /// Drop every binding pointing at `runtime_id`, returning the documents.
    pub async fn remove_runtime(
        &self,
        runtime_id: &RuntimeId,
    ) -> Result<Vec<DocumentId>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.all().await?;
        let documents: Vec<DocumentId> =
            map.iter().filter(|(_, rt)| *rt == runtime_id).map(|(doc, _)| doc.clone()).collect();
        if !documents.is_empty() {
            map.retain(|_, rt| *rt != *runtime_id);
            self.save(&map).await?;
        }
        Ok(documents)
    }

    async fn save(&self, map: &BindingMap) -> Result<(), StoreError> {
        if map.is_empty() {
            return self.store.remove(keys::BINDINGS).await;
        }
        self.store.set(keys::BINDINGS, serde_json::to_string(map)?).await
    }
}

#[cfg(test)]
#[path = "binding_tests.rs"]
mod tests;
