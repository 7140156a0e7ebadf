// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for external I/O: the remote runtime API and the network broker

pub mod broker;
pub mod credential;
pub mod remote;

pub use broker::{
    BrokerError, BrokerHandler, BrokerTransport, InProcessTransport, NetworkBroker,
    StreamTransport, TransportError,
};
pub use credential::Credentials;
pub use remote::{CreateRuntime, HttpRemoteApi, RemoteApi, RemoteApiError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use broker::FakeBroker;
#[cfg(any(test, feature = "test-support"))]
pub use remote::{FakeRemoteApi, RemoteCall};

#[cfg(test)]
mod test_server;
