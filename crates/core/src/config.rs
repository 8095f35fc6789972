// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-wide configuration: every path and tunable named across §3–§7,
//! resolved once at startup and injected into each component rather than
//! read from globals (Design Notes, "Global state").

use std::path::PathBuf;
use std::time::Duration;

/// Default location under the user's home directory, overridden wholesale
/// by `BUN_PM_SOCKET` (the name is historical: it names the daemon
/// directory via its most visible file, the endpoint locator).
const DEFAULT_DAEMON_DIR: &str = ".bun-pm";
const ENV_OVERRIDE: &str = "BUN_PM_SOCKET";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `daemon.sock`, `daemon.pid`, `daemon.json`, and the log root.
    pub daemon_dir: PathBuf,
    pub log_root: PathBuf,

    pub grace_period: Duration,
    pub memory_check_interval: Duration,
    pub monitoring_interval: Duration,
    pub max_history: usize,
    pub ring_capacity: usize,
    pub max_log_size: u64,
    pub max_rotations: u32,
    pub max_in_flight_writes: usize,
    pub intern_pool_cap: usize,

    pub connection_pool_capacity: usize,
    pub idle_timeout: Duration,
    pub pool_sweep_interval: Duration,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,

    pub base_restart_delay: Duration,
    pub max_restart_delay: Duration,

    pub max_error_log: usize,
}

impl Config {
    /// Resolve against `BUN_PM_SOCKET` (if set, its parent directory is the
    /// daemon directory) or `{home}/.bun-pm`.
    pub fn load() -> Self {
        let daemon_dir = match std::env::var(ENV_OVERRIDE) {
            Ok(path) if !path.is_empty() => PathBuf::from(path)
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DAEMON_DIR)),
            _ => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DEFAULT_DAEMON_DIR),
        };
        Self::with_daemon_dir(daemon_dir)
    }

    pub fn with_daemon_dir(daemon_dir: PathBuf) -> Self {
        let log_root = daemon_dir.join("logs");
        Self {
            daemon_dir,
            log_root,
            grace_period: Duration::from_millis(100),
            memory_check_interval: Duration::from_secs(30),
            monitoring_interval: Duration::from_secs(5),
            max_history: 100,
            ring_capacity: 1000,
            max_log_size: 10 * 1024 * 1024,
            max_rotations: 10,
            max_in_flight_writes: 10,
            intern_pool_cap: 4096,
            connection_pool_capacity: 100,
            idle_timeout: Duration::from_secs(300),
            pool_sweep_interval: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(10),
            base_restart_delay: Duration::from_secs(1),
            max_restart_delay: Duration::from_secs(30),
            max_error_log: 1000,
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.daemon_dir.join("daemon.sock")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.daemon_dir.join("daemon.pid")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.daemon_dir.join("daemon.json")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
