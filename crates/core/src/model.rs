// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The data model shared by every component: admitted configuration
//! ([`ProcessSpec`]), the runtime record it produces ([`Instance`]), the
//! units the Log Pipeline and Monitor append ([`LogEntry`], [`MetricSample`]),
//! and the control-plane/persistence envelopes ([`Envelope`],
//! [`FleetSnapshot`], [`DiscoveryRecord`]).

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::define_id;

define_id! {
    /// Identifies one concrete running (or terminal-but-retained) child
    /// process. Equal to `spec.id` when `spec.instances == 1`, otherwise
    /// `"{id}_{index}"`.
    pub struct InstanceId;
}

/// Admitted, immutable-per-admission configuration for a process (or a
/// clustered group of identical processes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub id: String,
    pub name: String,
    pub script: PathBuf,
    pub cwd: PathBuf,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_instances")]
    pub instances: u32,
    #[serde(default = "default_autorestart")]
    pub autorestart: bool,
    #[serde(default)]
    pub max_restarts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,
}

fn default_instances() -> u32 {
    1
}

fn default_autorestart() -> bool {
    true
}

impl ProcessSpec {
    /// `instanceId` for cluster index `i`, per §3.
    pub fn instance_id(&self, i: u32) -> InstanceId {
        if self.instances <= 1 {
            InstanceId::new(self.id.clone())
        } else {
            InstanceId::new(format!("{}_{}", self.id, i))
        }
    }

    /// All `instanceId`s this spec currently admits, `0..instances`.
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        (0..self.instances).map(|i| self.instance_id(i)).collect()
    }
}

/// Runtime status of an [`Instance`], per the §4.1 state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Running,
    Stopped,
    Errored,
    Restarting,
}

/// A live or terminal-but-retained child process, owned exclusively by the
/// Supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: InstanceId,
    pub spec_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub start_time: DateTime<Utc>,
    pub status: InstanceStatus,
    pub restart_count: u32,
}

impl Instance {
    pub fn new(instance_id: InstanceId, spec_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            instance_id,
            spec_id: spec_id.into(),
            pid: None,
            start_time,
            status: InstanceStatus::Running,
            restart_count: 0,
        }
    }
}

/// Which child stream a [`LogEntry`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One captured line of output, timestamped at arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub instance_id: InstanceId,
    pub stream: Stream,
    pub message: String,
}

impl LogEntry {
    /// Render as the on-disk line format: `"[<ISO-8601>] <message>"`.
    pub fn format_line(&self) -> String {
        format!("[{}] {}", crate::clock::format_iso8601(self.timestamp), self.message)
    }
}

/// One point-in-time resource sample for an Instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub rss_bytes: u64,
    pub uptime_sec: u64,
    pub restart_count: u32,
}

/// A control-plane message: either a client request or a daemon response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Request(RequestEnvelope),
    Response(ResponseEnvelope),
}

/// Request frame: `{"id","command","payload"}`, matching §6's wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: String,
    pub command: String,
    #[serde(default = "default_payload")]
    pub payload: serde_json::Value,
}

fn default_payload() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// Response frame: `{"id","success","data"?,"error"?}`, matching §6's wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn ok(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// The persisted fleet: every currently admitted [`ProcessSpec`], independent
/// of runtime status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub processes: Vec<ProcessSpec>,
}

/// Discovery metadata for a running daemon, matching the PID file shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub pid: u32,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "socketPath")]
    pub socket_path: String,
    pub version: String,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
