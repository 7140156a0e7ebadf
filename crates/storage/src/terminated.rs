// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sticky per-document "user terminated this" markers.
//!
//! A set flag blocks automatic runtime creation for the document across
//! restarts until it is explicitly cleared.

use crate::keys;
use crate::store::{StateStore, StoreError};
use nbr_core::DocumentId;
use std::sync::Arc;

pub struct TerminatedFlags<S: StateStore> {
    store: Arc<S>,
}

impl<S: StateStore> TerminatedFlags<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn is_set(&self, document_id: &DocumentId) -> Result<bool, StoreError> {
        self.store.has(&keys::terminated(document_id)).await
    }

    pub async fn set(&self, document_id: &DocumentId) -> Result<(), StoreError> {
        self.store.set(&keys::terminated(document_id), "true".to_string()).await
    }

    pub async fn clear(&self, document_id: &DocumentId) -> Result<(), StoreError> {
        self.store.remove(&keys::terminated(document_id)).await
    }
}
