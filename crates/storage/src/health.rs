// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health classification (§4.6): a daemon is `healthy` only when the PID
//! file, a live process, and a reachable control endpoint all agree;
//! `unhealthy` when the three signals disagree; `unknown` when none of
//! them are present at all (no daemon has ever run here).

use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tracing::info;

use crate::error::StorageError;
use crate::{locator, pidfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Unhealthy,
    Unknown,
}

const CONNECT_TIMEOUT: Duration = Duration::from_millis(200);

fn endpoint_reachable(port: u16) -> bool {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).is_ok()
}

/// Classify daemon health from its on-disk artifacts.
pub fn classify(pid_path: &Path, locator_path: &Path) -> Health {
    let pid_file_present = pidfile::read(pid_path).ok().flatten();
    let process_alive = pid_file_present
        .as_ref()
        .map(|r| pidfile::is_process_alive(r.pid))
        .unwrap_or(false);
    let endpoint_ok = locator::read(locator_path)
        .ok()
        .flatten()
        .map(endpoint_reachable)
        .unwrap_or(false);

    let signals = [pid_file_present.is_some(), process_alive, endpoint_ok];
    match signals.iter().filter(|&&ok| ok).count() {
        3 => Health::Healthy,
        0 => Health::Unknown,
        _ => Health::Unhealthy,
    }
}

/// Classify, and if `unhealthy`, remove the PID file and endpoint locator —
/// the fleet snapshot is left in place for a future resurrection.
pub fn cleanup_stale(pid_path: &Path, locator_path: &Path) -> Result<Health, StorageError> {
    let health = classify(pid_path, locator_path);
    if health == Health::Unhealthy {
        info!(pid_path = %pid_path.display(), "removing stale daemon artifacts");
        crate::atomic::remove_if_present(pid_path)?;
        locator::remove(locator_path)?;
    }
    Ok(health)
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
