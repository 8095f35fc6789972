// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy's runtime half (§4.7): a bounded log of recent
//! errors with per-category/severity counters, and a registry of recovery
//! strategies consulted before an error is surfaced to a client.

use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pmd_core::{Clock, ErrorCategory, ErrorCode, ErrorSeverity, InstanceId, PmdError};
use pmd_engine::{Ring, Supervisor};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub code: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub recovered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorStats {
    pub total: usize,
    #[serde(rename = "byCategory")]
    pub by_category: BTreeMap<String, usize>,
    #[serde(rename = "bySeverity")]
    pub by_severity: BTreeMap<String, usize>,
    #[serde(rename = "recentHour")]
    pub recent_hour: usize,
}

/// A recovery strategy: applies to a subset of errors and attempts to
/// repair the situation before the handler's response is composed.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_recover(&self, error: &PmdError) -> bool;
    async fn recover(&self, error: &PmdError) -> bool;
}

/// `process-restart`: applies to crash/memory-limit categories, consults
/// the Supervisor's restart stats, and succeeds if a restart is already
/// scheduled.
pub struct ProcessRestartStrategy {
    supervisor: Supervisor,
}

impl ProcessRestartStrategy {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }
}

#[async_trait]
impl RecoveryStrategy for ProcessRestartStrategy {
    fn name(&self) -> &'static str {
        "process-restart"
    }

    fn can_recover(&self, error: &PmdError) -> bool {
        matches!(error.code, ErrorCode::ProcessCrashed | ErrorCode::ProcessMemoryLimitExceeded)
    }

    async fn recover(&self, error: &PmdError) -> bool {
        let Some(instance_id) = error.context.get("instanceId") else {
            return false;
        };
        self.supervisor
            .get_restart_stats(&InstanceId::new(instance_id.clone()))
            .map(|s| s.can_restart)
            .unwrap_or(false)
    }
}

/// `ipc-reconnect`: applies to IPC connection/timeout errors and attempts
/// a single reconnect to the control plane's own advertised endpoint.
pub struct IpcReconnectStrategy {
    addr: SocketAddr,
    timeout: Duration,
}

impl IpcReconnectStrategy {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }
}

#[async_trait]
impl RecoveryStrategy for IpcReconnectStrategy {
    fn name(&self) -> &'static str {
        "ipc-reconnect"
    }

    fn can_recover(&self, error: &PmdError) -> bool {
        matches!(error.code, ErrorCode::IpcConnectionFailed | ErrorCode::IpcTimeout)
    }

    async fn recover(&self, _error: &PmdError) -> bool {
        let addr = self.addr;
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || TcpStream::connect_timeout(&addr, timeout).is_ok())
            .await
            .unwrap_or(false)
    }
}

#[derive(Default)]
pub struct RecoveryRegistry {
    strategies: Vec<Arc<dyn RecoveryStrategy>>,
}

impl RecoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: Arc<dyn RecoveryStrategy>) {
        self.strategies.push(strategy);
    }

    /// Invoke the first registered strategy whose `can_recover` matches and
    /// that itself succeeds.
    pub async fn try_recover(&self, error: &PmdError) -> bool {
        for strategy in &self.strategies {
            if strategy.can_recover(error) {
                if strategy.recover(error).await {
                    tracing::info!(strategy = strategy.name(), code = %error.code, "recovery succeeded");
                    return true;
                }
                tracing::warn!(strategy = strategy.name(), code = %error.code, "recovery attempt failed");
            }
        }
        false
    }
}

/// Bounded log of the most recent errors (default 1000), per §4.7.
pub struct ErrorLog {
    clock: Arc<dyn Clock>,
    entries: Mutex<Ring<ErrorLogEntry>>,
}

impl ErrorLog {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(Ring::new(capacity)),
        }
    }

    pub fn record(&self, error: &PmdError, recovered: bool) {
        let entry = ErrorLogEntry {
            timestamp: self.clock.wall_now(),
            code: error.code.as_str().to_string(),
            category: error.category(),
            severity: error.severity,
            message: error.detail().to_string(),
            context: error.context.clone(),
            recovered,
        };
        self.entries.lock().push(entry);
    }

    pub fn stats(&self) -> ErrorStats {
        let entries = self.entries.lock();
        let now = self.clock.wall_now();
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
        let mut recent_hour = 0;
        for entry in entries.iter() {
            *by_category.entry(entry.category.to_string()).or_default() += 1;
            *by_severity.entry(format!("{:?}", entry.severity).to_lowercase()).or_default() += 1;
            if (now - entry.timestamp).num_seconds() < 3600 {
                recent_hour += 1;
            }
        }
        ErrorStats {
            total: entries.len(),
            by_category,
            by_severity,
            recent_hour,
        }
    }

    /// The `limit` most recent entries, most recent last.
    pub fn tail(&self, limit: usize) -> Vec<ErrorLogEntry> {
        self.entries.lock().tail(limit).into_iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
