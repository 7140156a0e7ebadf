// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cached payload stamped with its write time and lifetime.
///
/// Expiry is lazy: an entry is logically absent once `now - cached_at_ms`
/// reaches `ttl_ms`, and is only evicted when someone reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    pub cached_at_ms: u64,
    pub ttl_ms: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, payload: T, cached_at_ms: u64, ttl: Duration) -> Self {
        Self { key: key.into(), payload, cached_at_ms, ttl_ms: ttl.as_millis() as u64 }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.cached_at_ms) >= self.ttl_ms
    }
}

/// Time-to-live per resource class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Spaces list and individual spaces
    pub spaces: Duration,
    /// Notebook/document lists and their entities
    pub items: Duration,
    /// Notebook/document content
    pub content: Duration,
    pub environments: Duration,
    /// Individual runtime records
    pub runtime: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            spaces: Duration::from_secs(30 * 60),
            items: Duration::from_secs(10 * 60),
            content: Duration::from_secs(5 * 60),
            environments: Duration::from_secs(60 * 60),
            runtime: Duration::from_secs(5 * 60),
        }
    }
}

impl TtlPolicy {
    nbr_core::setters! {
        set {
            spaces: Duration,
            items: Duration,
            content: Duration,
            environments: Duration,
            runtime: Duration,
        }
    }
}
