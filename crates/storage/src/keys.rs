// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State store key layout.
//!
//! Every cache key shares the `nbr.cache.` prefix so scoped invalidation can
//! match on prefixes. Recents, bindings, and terminated flags live outside the
//! cache namespace and survive `invalidate(All)`.

use nbr_core::ResourceKind;

pub const CACHE_PREFIX: &str = "nbr.cache.";
/// Registry of every cache key written, for enumeration and invalidation
pub const REGISTRY: &str = "nbr.cache.keys";
pub const SPACES: &str = "nbr.cache.spaces";
pub const SPACE_PREFIX: &str = "nbr.cache.space.";
pub const NOTEBOOKS_PREFIX: &str = "nbr.cache.notebooks.";
pub const DOCUMENTS_PREFIX: &str = "nbr.cache.documents.";
pub const CONTENT_PREFIX: &str = "nbr.cache.content.";
pub const ENVIRONMENTS: &str = "nbr.cache.environments";
pub const RUNTIME_PREFIX: &str = "nbr.cache.runtime.";
pub const RECENT: &str = "nbr.recent";
pub const BINDINGS: &str = "nbr.bindings";
pub const TERMINATED_PREFIX: &str = "nbr.terminated.";

pub fn space(id: &str) -> String {
    format!("{SPACE_PREFIX}{id}")
}

pub fn notebooks(space_id: &str) -> String {
    format!("{NOTEBOOKS_PREFIX}{space_id}")
}

pub fn notebook(id: &str) -> String {
    format!("nbr.cache.notebook.{id}")
}

pub fn documents(space_id: &str) -> String {
    format!("{DOCUMENTS_PREFIX}{space_id}")
}

pub fn document(id: &str) -> String {
    format!("nbr.cache.document.{id}")
}

pub fn content(kind: ResourceKind, id: &str) -> String {
    format!("{CONTENT_PREFIX}{kind}.{id}")
}

pub fn runtime(pod_name: &str) -> String {
    format!("{RUNTIME_PREFIX}{pod_name}")
}

pub fn terminated(document_id: &str) -> String {
    format!("{TERMINATED_PREFIX}{document_id}")
}
