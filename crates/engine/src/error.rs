// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use nbr_adapters::{RemoteApiError, TransportError};
use nbr_core::{ConnectionId, DocumentId, RuntimeId, TransitionError};
use nbr_storage::{CacheError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),
    #[error("runtime {0} has no ingress")]
    MissingIngress(RuntimeId),
    #[error("broker error: {0}")]
    Transport(#[from] TransportError),
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

impl ProxyError {
    /// Map a transport failure for a request about `id`.
    pub(crate) fn for_connection(id: &ConnectionId, error: TransportError) -> Self {
        if error.is_connection_not_found() {
            Self::ConnectionNotFound(id.clone())
        } else {
            Self::Transport(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("authentication failed: {0}")]
    Auth(RemoteApiError),

    #[error("{0}")]
    Remote(RemoteApiError),

    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("connectivity error: {0}")]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("runtime {0} was created without an ingress")]
    NoIngress(RuntimeId),

    #[error("runtime start for {0} was cancelled")]
    Cancelled(DocumentId),
}

impl From<RemoteApiError> for LifecycleError {
    fn from(e: RemoteApiError) -> Self {
        if e.is_auth() {
            Self::Auth(e)
        } else {
            Self::Remote(e)
        }
    }
}

impl LifecycleError {
    /// Whether this failure should put the document into a user-visible
    /// error state. Everything else is logged and recovered from.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Remote(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
