// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request, response, and event payloads.

use nbr_core::ConnectionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Single HTTP round trip performed by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { url: url.into(), method: method.into(), headers: BTreeMap::new(), body: None }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsOpenRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsOpenResponse {
    pub id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsSendRequest {
    pub id: ConnectionId,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsCloseRequest {
    pub id: ConnectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Open,
    Message,
    Close,
    Error,
}

nbr_core::simple_display! {
    EventKind {
        Open => "open",
        Message => "message",
        Close => "close",
        Error => "error",
    }
}

/// Socket event pushed from the broker on the shared event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerEvent {
    pub id: ConnectionId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BrokerEvent {
    fn bare(id: ConnectionId, kind: EventKind) -> Self {
        Self { id, kind, data: None, code: None, reason: None, error: None }
    }

    pub fn open(id: ConnectionId) -> Self {
        Self::bare(id, EventKind::Open)
    }

    pub fn message(id: ConnectionId, data: impl Into<String>) -> Self {
        Self { data: Some(data.into()), ..Self::bare(id, EventKind::Message) }
    }

    pub fn close(id: ConnectionId, code: Option<u16>, reason: Option<String>) -> Self {
        Self { code, reason, ..Self::bare(id, EventKind::Close) }
    }

    pub fn error(id: ConnectionId, error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::bare(id, EventKind::Error) }
    }

    /// Close and error end the connection.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Close | EventKind::Error)
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
