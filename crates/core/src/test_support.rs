// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Environment, RuntimeRecord, RuntimeStatus};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::runtime::RuntimeStatus;
    use proptest::prelude::*;

    pub fn arb_runtime_status() -> impl Strategy<Value = RuntimeStatus> {
        prop_oneof![
            Just(RuntimeStatus::Creating),
            Just(RuntimeStatus::Running),
            Just(RuntimeStatus::Terminating),
            Just(RuntimeStatus::Terminated),
            Just(RuntimeStatus::Error),
        ]
    }
}

// ── Record factories ────────────────────────────────────────────────────

/// A running record with an ingress, as the remote API returns after create.
pub fn running_runtime(pod: &str) -> RuntimeRecord {
    RuntimeRecord::builder(pod).build()
}

/// A record the platform has accepted but that may not be serving yet.
pub fn creating_runtime(pod: &str) -> RuntimeRecord {
    RuntimeRecord::builder(pod).status(RuntimeStatus::Creating).build()
}

pub fn environments() -> Vec<Environment> {
    vec![Environment::new("python-cpu-env"), Environment::new("ai-env")]
}
