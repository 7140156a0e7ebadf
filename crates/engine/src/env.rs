// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::time::Duration;

pub const DEFAULT_ENVIRONMENT: &str = "python-cpu-env";

fn duration_ms(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Delay before the first readiness probe (default 8s)
pub fn poll_grace() -> Duration {
    duration_ms("NBR_POLL_GRACE_MS", Duration::from_secs(8))
}

/// Interval between readiness probes (default 5s)
pub fn poll_interval() -> Duration {
    duration_ms("NBR_POLL_INTERVAL_MS", Duration::from_secs(5))
}

/// Readiness budget after the grace delay (default 60s)
pub fn poll_timeout() -> Duration {
    duration_ms("NBR_POLL_TIMEOUT_MS", Duration::from_secs(60))
}

/// Window in which an identical mutating operation is skipped (default 5s)
pub fn dedup_window() -> Duration {
    duration_ms("NBR_DEDUP_WINDOW_MS", Duration::from_secs(5))
}

/// Environment new runtimes are created from.
pub fn default_environment() -> String {
    std::env::var("NBR_DEFAULT_ENVIRONMENT")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Credit cap for new runtimes. Unset means the platform default.
pub fn default_credits() -> Option<f64> {
    std::env::var("NBR_DEFAULT_CREDITS").ok().and_then(|s| s.parse::<f64>().ok())
}

/// Lifecycle tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub default_environment: String,
    pub poll_grace: Duration,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub dedup_window: Duration,
    pub default_credits: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_environment: DEFAULT_ENVIRONMENT.to_string(),
            poll_grace: Duration::from_secs(8),
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(60),
            dedup_window: Duration::from_secs(5),
            default_credits: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            default_environment: default_environment(),
            poll_grace: poll_grace(),
            poll_interval: poll_interval(),
            poll_timeout: poll_timeout(),
            dedup_window: dedup_window(),
            default_credits: default_credits(),
        }
    }

    nbr_core::setters! {
        into {
            default_environment: String,
        }
        set {
            poll_grace: Duration,
            poll_interval: Duration,
            poll_timeout: Duration,
            dedup_window: Duration,
        }
        option {
            default_credits: f64,
        }
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
