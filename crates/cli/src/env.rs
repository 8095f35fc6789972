// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Override the `pmd` binary path the CLI spawns when no daemon is running.
pub fn daemon_binary() -> Option<String> {
    std::env::var("PMCTL_DAEMON_BINARY").ok()
}

pub fn timeout_connect_ms() -> Option<Duration> {
    parse_duration_ms("PMCTL_TIMEOUT_CONNECT_MS")
}

pub fn timeout_send_ms() -> Option<Duration> {
    parse_duration_ms("PMCTL_TIMEOUT_SEND_MS")
}
