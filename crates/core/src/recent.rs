// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded most-recently-used list of opened resources.

use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};

pub const MAX_RECENT_ITEMS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentItem {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub accessed_at_ms: u64,
}

/// Most-recent-first, unique by id, at most [`MAX_RECENT_ITEMS`] long.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentList {
    items: Vec<RecentItem>,
}

impl RecentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move (or insert) `item` to the front, dropping the oldest overflow.
    pub fn push(&mut self, item: RecentItem) {
        self.items.retain(|existing| existing.id != item.id);
        self.items.insert(0, item);
        self.items.truncate(MAX_RECENT_ITEMS);
    }

    pub fn items(&self) -> &[RecentItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<RecentItem> {
        self.items
    }
}

#[cfg(test)]
#[path = "recent_tests.rs"]
mod tests;
