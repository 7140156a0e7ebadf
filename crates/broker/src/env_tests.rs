// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn log_dir_prefers_explicit_override() {
    std::env::set_var("NBR_LOG_DIR", "/tmp/nbr-logs");
    std::env::set_var("XDG_STATE_HOME", "/tmp/xdg");
    assert_eq!(log_dir(), Some(PathBuf::from("/tmp/nbr-logs")));
    std::env::remove_var("NBR_LOG_DIR");
    std::env::remove_var("XDG_STATE_HOME");
}

#[test]
#[serial]
fn log_dir_falls_back_to_xdg_state() {
    std::env::remove_var("NBR_LOG_DIR");
    std::env::set_var("XDG_STATE_HOME", "/tmp/xdg");
    assert_eq!(log_dir(), Some(PathBuf::from("/tmp/xdg/nbr/logs")));
    std::env::remove_var("XDG_STATE_HOME");
}

#[test]
#[serial]
fn http_timeout_parses_millis_or_defaults() {
    std::env::set_var("NBR_HTTP_TIMEOUT_MS", "1500");
    assert_eq!(http_timeout(), Duration::from_millis(1500));
    std::env::set_var("NBR_HTTP_TIMEOUT_MS", "soon");
    assert_eq!(http_timeout(), Duration::from_secs(30));
    std::env::remove_var("NBR_HTTP_TIMEOUT_MS");
}
