// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances_monotonic_and_wall() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    let w0 = clock.wall_now();
    clock.advance(Duration::from_secs(5));
    assert!(clock.now() >= t0 + Duration::from_secs(5));
    assert_eq!(clock.wall_now() - w0, chrono::Duration::seconds(5));
}

#[test]
fn fake_clock_set_wall_overrides_timestamp() {
    let clock = FakeClock::new();
    let t = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    clock.set_wall(t);
    assert_eq!(clock.wall_now(), t);
}

#[test]
fn format_iso8601_matches_expected_shape() {
    let t = DateTime::parse_from_rfc3339("2026-01-30T08:14:09Z")
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(format_iso8601(t), "2026-01-30T08:14:09Z");
}

#[test]
fn system_clock_epoch_ms_is_positive() {
    let clock = SystemClock;
    assert!(clock.epoch_ms() > 0);
}
