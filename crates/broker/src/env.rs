// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the broker binary.

use std::path::PathBuf;
use std::time::Duration;

/// Log file name prefix; the appender adds the date suffix.
pub const LOG_FILE_PREFIX: &str = "nbrd.log";

/// Resolve log directory: NBR_LOG_DIR > XDG_STATE_HOME/nbr/logs > ~/.local/state/nbr/logs
///
/// `None` when no home directory is known; logs then go to stderr.
pub fn log_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("NBR_LOG_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("nbr/logs"));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".local/state/nbr/logs"))
}

/// Bound on each HTTP round trip and WebSocket handshake (default 30s).
pub fn http_timeout() -> Duration {
    std::env::var("NBR_HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
