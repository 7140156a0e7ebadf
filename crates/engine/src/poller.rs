// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Readiness polling for freshly created runtimes.
//!
//! A new pod takes a few seconds to start serving. The poller waits a grace
//! period, then probes at a fixed interval until the probe succeeds or the
//! budget runs out. The budget starts after the grace delay and also bounds
//! each probe, so a hung probe cannot stretch the wait.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_GRACE: Duration = Duration::from_secs(8);

/// A single liveness check against a runtime's server.
#[async_trait]
pub trait LivenessProbe: Send + Sync + 'static {
    /// True only when the server answered 200.
    async fn probe(&self, url: &str, token: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Ready,
    /// Budget exhausted; the runtime may still come up
    TimedOut,
    Cancelled,
}

pub struct ReadinessPoller<P: LivenessProbe> {
    probe: Arc<P>,
    grace: Duration,
}

impl<P: LivenessProbe> ReadinessPoller<P> {
    pub fn new(probe: Arc<P>) -> Self {
        Self { probe, grace: DEFAULT_GRACE }
    }

    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Poll until ready. A timeout still counts as success.
    pub async fn poll(
        &self,
        url: &str,
        token: &str,
        max_wait: Duration,
        interval: Duration,
    ) -> bool {
        let cancel = CancellationToken::new();
        let outcome = self.poll_until(url, token, max_wait, interval, &cancel).await;
        outcome != PollOutcome::Cancelled
    }

    pub async fn poll_until(
        &self,
        url: &str,
        token: &str,
        max_wait: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(self.grace) => {}
        }

        let deadline = Instant::now() + max_wait;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let ready = tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                result = tokio::time::timeout(remaining, self.probe.probe(url, token)) => {
                    result.unwrap_or(false)
                }
            };
            if ready {
                tracing::info!(url, attempt, "runtime ready");
                return PollOutcome::Ready;
            }
            tracing::debug!(url, attempt, "runtime not ready yet");

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(
                    url,
                    attempt,
                    budget_ms = max_wait.as_millis() as u64,
                    "readiness budget exhausted"
                );
                return PollOutcome::TimedOut;
            }
            tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                _ = tokio::time::sleep(interval.min(remaining)) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
