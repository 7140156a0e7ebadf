// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! nbr-core: shared types for the notebook runtime controller

pub mod macros;

pub mod clock;
pub mod id;
pub mod phase;
pub mod recent;
pub mod resource;
pub mod runtime;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{short, ConnectionId, DocumentId, RuntimeId, SpaceId};
pub use phase::LifecyclePhase;
pub use recent::{RecentItem, RecentList, MAX_RECENT_ITEMS};
pub use resource::{DocumentSummary, Environment, NotebookSummary, ResourceKind, Space};
#[cfg(any(test, feature = "test-support"))]
pub use runtime::RuntimeRecordBuilder;
pub use runtime::{RuntimeRecord, RuntimeStatus, TransitionError};
