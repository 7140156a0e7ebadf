// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote resource metadata cached on the client.

use crate::id::{DocumentId, SpaceId};
use serde::{Deserialize, Serialize};

/// Resource class, used for recent items and content cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Space,
    Notebook,
    Document,
    Runtime,
    Environment,
}

crate::simple_display! {
    ResourceKind {
        Space => "space",
        Notebook => "notebook",
        Document => "document",
        Runtime => "runtime",
        Environment => "environment",
    }
}

/// A workspace grouping notebooks and documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_ms: Option<u64>,
}

impl Space {
    pub fn new(id: impl Into<SpaceId>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), description: None, updated_at_ms: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookSummary {
    pub id: DocumentId,
    pub space_id: SpaceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_ms: Option<u64>,
}

impl NotebookSummary {
    pub fn new(
        id: impl Into<DocumentId>,
        space_id: impl Into<SpaceId>,
        name: impl Into<String>,
    ) -> Self {
        Self { id: id.into(), space_id: space_id.into(), name: name.into(), updated_at_ms: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub space_id: SpaceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_ms: Option<u64>,
}

impl DocumentSummary {
    pub fn new(
        id: impl Into<DocumentId>,
        space_id: impl Into<SpaceId>,
        name: impl Into<String>,
    ) -> Self {
        Self { id: id.into(), space_id: space_id.into(), name: name.into(), updated_at_ms: None }
    }
}

/// A runtime template offered by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Credits consumed per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burning_rate: Option<f64>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            language: None,
            burning_rate: None,
        }
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
