// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared daemon state: one instance, handed to every connection task and
//! every handler invocation.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use pmd_core::{Clock, Config};
use pmd_engine::Supervisor;
use tokio::sync::Notify;

use crate::errors::{ErrorLog, RecoveryRegistry};
use crate::pool::ConnectionPool;

pub struct AppState {
    pub config: Config,
    pub supervisor: Supervisor,
    pub clock: Arc<dyn Clock>,
    pub pool: Arc<ConnectionPool>,
    pub error_log: ErrorLog,
    pub recovery: RecoveryRegistry,
    pub pid: u32,
    pub start_time: DateTime<Utc>,
    pub start_instant: Instant,
    pub shutdown: Notify,
    port: AtomicU16,
}

impl AppState {
    pub fn new(config: Config, supervisor: Supervisor, clock: Arc<dyn Clock>, pid: u32) -> Self {
        let pool = ConnectionPool::new(config.connection_pool_capacity, config.idle_timeout);
        Self {
            error_log: ErrorLog::new(config.max_error_log, clock.clone()),
            start_time: clock.wall_now(),
            start_instant: clock.now(),
            config,
            supervisor,
            clock,
            pool,
            recovery: RecoveryRegistry::new(),
            pid,
            shutdown: Notify::new(),
            port: AtomicU16::new(0),
        }
    }

    pub fn set_port(&self, port: u16) {
        self.port.store(port, Ordering::SeqCst);
    }

    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.clock.now().saturating_duration_since(self.start_instant).as_secs()
    }
}
