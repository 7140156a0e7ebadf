// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-document lifecycle phase.

use serde::{Deserialize, Serialize};

/// Where a document's runtime lifecycle currently stands.
///
/// `Uninitialized → Creating → AwaitingReady → Ready → Terminating →
/// Terminated`, with `Error` reachable from `Creating` or `AwaitingReady`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    #[default]
    Uninitialized,
    Creating,
    AwaitingReady,
    Ready,
    Terminating,
    Terminated,
    Error,
}

crate::simple_display! {
    LifecyclePhase {
        Uninitialized => "uninitialized",
        Creating => "creating",
        AwaitingReady => "awaiting_ready",
        Ready => "ready",
        Terminating => "terminating",
        Terminated => "terminated",
        Error => "error",
    }
}
