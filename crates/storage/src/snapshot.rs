// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fleet snapshot (`daemon.json`): the daemon's PID, start time, socket,
//! and every live [`Instance`], rewritten atomically after each mutating
//! command so a crashed daemon's last-known fleet is still on disk.

use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use pmd_core::{Instance, InstanceId, InstanceStatus};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// One instance's runtime facts, as persisted in the fleet snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub status: InstanceStatus,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "restartCount")]
    pub restart_count: u32,
}

impl From<&Instance> for InstanceSnapshot {
    fn from(i: &Instance) -> Self {
        Self {
            id: i.instance_id.as_str().to_string(),
            pid: i.pid,
            status: i.status,
            start_time: i.start_time,
            restart_count: i.restart_count,
        }
    }
}

/// The full contents of `daemon.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSnapshotFile {
    pub pid: u32,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "socketPath")]
    pub socket_path: String,
    pub processes: IndexMap<InstanceId, InstanceSnapshot>,
}

impl FleetSnapshotFile {
    pub fn new(pid: u32, start_time: DateTime<Utc>, socket_path: impl Into<String>, instances: &[Instance]) -> Self {
        let processes = instances
            .iter()
            .map(|i| (i.instance_id.clone(), InstanceSnapshot::from(i)))
            .collect();
        Self {
            pid,
            start_time,
            socket_path: socket_path.into(),
            processes,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        crate::atomic::write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Option<Self>, StorageError> {
        crate::atomic::read_json(path)
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
