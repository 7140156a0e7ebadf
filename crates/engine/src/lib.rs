// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! nbr-engine: runtime lifecycle orchestration
//!
//! Ties the cache, the remote platform API, readiness polling, and the
//! connectivity proxy together into a per-document runtime state machine.

mod dedup;
pub mod env;
mod error;
mod lifecycle;
mod poller;
mod proxy;

pub use dedup::{Dedup, ExecutionDedup};
pub use env::EngineConfig;
pub use error::{LifecycleError, ProxyError};
pub use lifecycle::{
    ActiveBinding, EnsureOutcome, LifecycleDeps, ReconnectReport, RuntimeLifecycleManager,
    SyncReport,
};
pub use poller::{LivenessProbe, PollOutcome, ReadinessPoller};
pub use proxy::{ConnectionHandle, ConnectivityProxy, WsConnection, EARLY_EVENT_LIMIT};

#[cfg(test)]
mod test_helpers;
