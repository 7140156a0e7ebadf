// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! nbr-storage: persisted key-value state and the typed TTL cache over it

mod binding;
mod cache;
mod entry;
pub mod keys;
mod store;
mod terminated;

pub use binding::BindingStore;
pub use cache::{CacheError, CacheLayer, CacheStats, InvalidateScope};
pub use entry::{CacheEntry, TtlPolicy};
pub use store::{FileStore, MemoryStore, StateStore, StoreError};
pub use terminated::TerminatedFlags;
