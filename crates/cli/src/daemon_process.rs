// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawning and probing the `pmd` daemon process from the `pmctl` client.

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use pmd_core::Config;

/// Start the daemon in the background, returning the child process handle.
pub fn start_daemon_background() -> std::io::Result<std::process::Child> {
    let path = find_pmd_binary();
    Command::new(&path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
}

/// Poll the locator file until the daemon is reachable, or `timeout` elapses.
pub async fn wait_for_ready(config: &Config, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if pmd_storage::locator::read(&config.socket_path()).ok().flatten().is_some() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn find_pmd_binary() -> PathBuf {
    if let Some(path) = crate::env::daemon_binary() {
        return PathBuf::from(path);
    }

    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let sibling = dir.join("pmd");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from("pmd")
}

/// Remove a stale locator/PID pair left by a daemon that is no longer
/// running, so a fresh one can start cleanly.
pub fn cleanup_stale_files(config: &Config) {
    if let Ok(Some(record)) = pmd_storage::pidfile::read(&config.pid_path()) {
        if pmd_storage::pidfile::is_process_alive(record.pid) {
            return;
        }
    }
    let _ = pmd_storage::locator::remove(&config.socket_path());
    let _ = std::fs::remove_file(config.pid_path());
}
