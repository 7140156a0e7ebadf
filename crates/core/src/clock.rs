// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time sources.
//!
//! Cache entries and runtime records persist wall-clock milliseconds while
//! deduplication windows measure monotonic time, so a [`Clock`] answers both.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Epoch milliseconds a [`FakeClock`] starts at.
pub const FAKE_EPOCH_MS: u64 = 1_000_000;

pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic now, for measuring elapsed windows.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch, for persisted timestamps.
    fn epoch_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
    }
}

#[derive(Debug)]
struct FakeTime {
    instant: Instant,
    epoch_ms: u64,
}

/// Manually driven clock. Clones share one timeline.
#[derive(Debug, Clone)]
pub struct FakeClock {
    time: Arc<Mutex<FakeTime>>,
}

impl FakeClock {
    pub fn new() -> Self {
        let time = FakeTime { instant: Instant::now(), epoch_ms: FAKE_EPOCH_MS };
        Self { time: Arc::new(Mutex::new(time)) }
    }

    /// Move both the monotonic and the wall-clock view forward.
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock();
        time.instant += by;
        time.epoch_ms += by.as_millis() as u64;
    }

    /// Jump the wall clock without touching monotonic time.
    pub fn set_epoch_ms(&self, ms: u64) {
        self.time.lock().epoch_ms = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.time.lock().instant
    }

    fn epoch_ms(&self) -> u64 {
        self.time.lock().epoch_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
