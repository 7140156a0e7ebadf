// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network broker seams.
//!
//! The broker is the privileged side: it owns real sockets and performs HTTP.
//! The UI-logic side talks to it through a [`BrokerTransport`], either
//! in-process or over a framed byte stream to the `nbrd` process.
//!
//! ```text
//! ConnectivityProxy ── BrokerTransport ──► BrokerHandler (NetworkBroker)
//!                  ◄── shared event channel ──┘
//! ```

mod network;
mod transport;

pub use network::NetworkBroker;
pub use transport::{InProcessTransport, StreamTransport, DEFAULT_REQUEST_TIMEOUT};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBroker;

use async_trait::async_trait;
use nbr_core::ConnectionId;
use nbr_wire::{BrokerEvent, BrokerReply, BrokerRequest, ProtocolError};
use thiserror::Error;
use tokio::sync::mpsc;

/// Capacity of the shared event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Failures on the broker side, reported back as response errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),
    #[error("http request failed: {0}")]
    Http(String),
    #[error("websocket failed: {0}")]
    WebSocket(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures seen by the UI-logic side of a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The broker answered with an error
    #[error("{0}")]
    Broker(String),
    #[error("broker request timed out")]
    Timeout,
    #[error("broker connection closed")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// Whether the broker rejected the request for an unknown connection id.
    pub fn is_connection_not_found(&self) -> bool {
        matches!(self, Self::Broker(msg) if msg.starts_with("connection not found"))
    }
}

/// Executes broker requests against the network.
#[async_trait]
pub trait BrokerHandler: Send + Sync + 'static {
    async fn handle(&self, request: BrokerRequest) -> Result<BrokerReply, BrokerError>;
}

/// UI-logic side of the broker channel.
#[async_trait]
pub trait BrokerTransport: Send + Sync + 'static {
    async fn request(&self, request: BrokerRequest) -> Result<BrokerReply, TransportError>;

    /// Take the shared event stream. Only the first caller gets it.
    fn take_events(&self) -> Option<mpsc::Receiver<BrokerEvent>>;
}
