// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic and wall-clock time, injected rather than read from globals.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Time source used throughout the daemon so tests can control the clock.
pub trait Clock: Send + Sync {
    /// Monotonic instant, for durations and timers.
    fn now(&self) -> Instant;

    /// Wall-clock time, for timestamps that leave the process (logs, snapshots).
    fn wall_now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch, for compact wire/storage fields.
    fn epoch_ms(&self) -> u64 {
        self.wall_now().timestamp_millis().max(0) as u64
    }
}

/// Real clock backed by the OS.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests: advances only when told to.
#[derive(Clone)]
pub struct FakeClock {
    monotonic: Arc<Mutex<Instant>>,
    wall: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            monotonic: Arc::new(Mutex::new(Instant::now())),
            wall: Arc::new(Mutex::new(Utc::now())),
        }
    }

    /// Advance both the monotonic and wall clocks by `d`.
    pub fn advance(&self, d: Duration) {
        *self.monotonic.lock() += d;
        *self.wall.lock() += chrono::Duration::from_std(d).unwrap_or_default();
    }

    pub fn set_wall(&self, t: DateTime<Utc>) {
        *self.wall.lock() = t;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.monotonic.lock()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        *self.wall.lock()
    }
}

/// Format a wall-clock timestamp as ISO-8601 with second precision, matching
/// the `"[<ISO-8601>] "` log line prefix and the JSON timestamp fields.
pub fn format_iso8601(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
