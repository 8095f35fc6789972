// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const BASE: Duration = Duration::from_secs(1);
const MAX: Duration = Duration::from_secs(30);

#[test]
fn first_restart_uses_base_delay() {
    let d = restart_delay(1, BASE, MAX, 0.0);
    assert_eq!(d, Duration::from_secs(1));
}

#[test]
fn delay_doubles_each_restart() {
    assert_eq!(restart_delay(2, BASE, MAX, 0.0), Duration::from_secs(2));
    assert_eq!(restart_delay(3, BASE, MAX, 0.0), Duration::from_secs(4));
    assert_eq!(restart_delay(4, BASE, MAX, 0.0), Duration::from_secs(8));
}

#[test]
fn exponent_is_capped_at_five() {
    // restart_count - 1 saturates at 5, so count=7 and count=20 agree.
    assert_eq!(restart_delay(7, BASE, MAX, 0.0), restart_delay(20, BASE, MAX, 0.0));
}

#[test]
fn delay_is_clamped_at_max_delay() {
    let d = restart_delay(20, BASE, MAX, 0.0);
    assert_eq!(d, MAX);
}

#[test]
fn jitter_only_adds_never_subtracts() {
    let bare = restart_delay(3, BASE, MAX, 0.0);
    let jittered = restart_delay(3, BASE, MAX, 0.1);
    assert!(jittered >= bare);
    assert!(jittered <= bare + bare / 10 + Duration::from_millis(1));
}
