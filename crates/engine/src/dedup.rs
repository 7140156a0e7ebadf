// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Short-window deduplication of mutating operations.
//!
//! An operation's signature is the SHA-256 of its name and canonical JSON
//! arguments (object keys sorted). A signature seen within the window is a
//! duplicate and is skipped.

use nbr_core::Clock;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Result of a deduplicated execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Dedup<T> {
    Executed(T),
    /// An identical call ran within the window; nothing was executed
    Duplicate,
}

impl<T> Dedup<T> {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }

    pub fn executed(self) -> Option<T> {
        match self {
            Self::Executed(value) => Some(value),
            Self::Duplicate => None,
        }
    }
}

pub struct ExecutionDedup<C: Clock> {
    clock: C,
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl<C: Clock> ExecutionDedup<C> {
    pub fn new(clock: C, window: Duration) -> Self {
        Self { clock, window, seen: Mutex::new(HashMap::new()) }
    }

    pub fn signature(operation: &str, args: &serde_json::Value) -> String {
        // serde_json's Value keeps object keys sorted, so this is canonical
        let canonical = format!("{operation}:{args}");
        format!("{:x}", Sha256::digest(canonical.as_bytes()))
    }

    /// Record `signature` unless it was seen within the window.
    ///
    /// Returns `true` when the caller should execute.
    pub fn try_begin(&self, signature: &str) -> bool {
        let now = self.clock.now();
        let mut seen = self.seen.lock();
        seen.retain(|_, at| now.duration_since(*at) < self.window);
        if seen.contains_key(signature) {
            return false;
        }
        seen.insert(signature.to_string(), now);
        true
    }

    /// Drop a recorded signature so the operation may run again.
    pub fn forget(&self, signature: &str) {
        self.seen.lock().remove(signature);
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
