// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jittered exponential backoff for the Supervisor's restart timer (§4.1).

use std::time::Duration;

/// `delay = min(baseDelay * 2^min(restartCount-1, 5) + jitter, maxDelay)`,
/// `jitter = U(0, 0.1 * exponential)`. `restart_count` is the count *after*
/// incrementing at scheduling time, so the first restart (`restart_count ==
/// 1`) uses exponent `0`.
pub fn restart_delay(
    restart_count: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_fraction: f64,
) -> Duration {
    let exponent = restart_count.saturating_sub(1).min(5);
    let exponential = base_delay.as_secs_f64() * 2f64.powi(exponent as i32);
    let jitter = jitter_fraction * exponential;
    let delay = exponential + jitter;
    Duration::from_secs_f64(delay.min(max_delay.as_secs_f64()))
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
