// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notebook runtime broker
//!
//! The privileged half of the broker channel: performs HTTP and owns
//! WebSockets on behalf of the UI-logic process.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
mod serve;

pub use serve::{serve, ServeError, DRAIN_TIMEOUT};
