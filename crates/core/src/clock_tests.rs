// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_reports_current_epoch() {
    // 2024-01-01T00:00:00Z
    assert!(SystemClock.epoch_ms() > 1_704_067_200_000);
}

#[test]
fn fake_clock_starts_at_fixed_epoch() {
    assert_eq!(FakeClock::new().epoch_ms(), FAKE_EPOCH_MS);
}

#[test]
fn advance_moves_monotonic_and_wall_time_together() {
    let clock = FakeClock::new();
    let start = clock.now();
    clock.advance(Duration::from_millis(299_999));

    assert_eq!(clock.now() - start, Duration::from_millis(299_999));
    assert_eq!(clock.epoch_ms() - FAKE_EPOCH_MS, 299_999);
}

#[test]
fn clones_share_a_timeline() {
    let clock = FakeClock::new();
    let view = clock.clone();
    view.advance(Duration::from_secs(5));
    assert_eq!(clock.epoch_ms(), FAKE_EPOCH_MS + 5_000);
}

#[test]
fn set_epoch_leaves_monotonic_time_alone() {
    let clock = FakeClock::default();
    let start = clock.now();
    clock.set_epoch_ms(10);
    assert_eq!(clock.epoch_ms(), 10);
    assert_eq!(clock.now(), start);
}
