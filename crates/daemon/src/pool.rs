// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control plane's connection pool (§4.4): bounded capacity with
//! oldest-idle eviction, per-connection activity tracking, and the
//! statistics `status` exposes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// The "used within last 60s" window for `active` in pool statistics,
/// independent of `idleTimeout`.
const ACTIVE_WINDOW: Duration = Duration::from_secs(60);

struct Entry {
    last_activity: Instant,
    message_count: u64,
    close: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    #[serde(rename = "totalMessages")]
    pub total_messages: u64,
    #[serde(rename = "averageMessagesPerConnection")]
    pub average_messages_per_connection: f64,
}

/// Handle a connection task uses to participate in the pool: forced close
/// arrives on `closed`, and every inbound frame must call [`ConnectionPool::touch`].
pub struct ConnectionHandle {
    pub id: u64,
    pub closed: oneshot::Receiver<()>,
}

pub struct ConnectionPool {
    capacity: usize,
    idle_timeout: Duration,
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, Entry>>,
}

impl ConnectionPool {
    pub fn new(capacity: usize, idle_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            idle_timeout,
            next_id: AtomicU64::new(1),
            entries: Mutex::new(BTreeMap::new()),
        })
    }

    /// Register a newly accepted connection, evicting the oldest idle
    /// connection first if the pool is already at capacity.
    pub fn register(&self) -> ConnectionHandle {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            if let Some((&oldest, _)) = entries.iter().min_by_key(|(_, e)| e.last_activity) {
                if let Some(entry) = entries.remove(&oldest) {
                    if let Some(close) = entry.close {
                        let _ = close.send(());
                    }
                }
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (close_tx, close_rx) = oneshot::channel();
        entries.insert(
            id,
            Entry {
                last_activity: Instant::now(),
                message_count: 0,
                close: Some(close_tx),
            },
        );
        ConnectionHandle { id, closed: close_rx }
    }

    /// Record one inbound frame, refreshing the connection's activity
    /// timestamp.
    pub fn touch(&self, id: u64) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.last_activity = Instant::now();
            entry.message_count += 1;
        }
    }

    pub fn unregister(&self, id: u64) {
        self.entries.lock().remove(&id);
    }

    /// Close every connection idle longer than `idleTimeout`. Intended to
    /// run from a periodic sweep task.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let stale: Vec<u64> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_activity) > self.idle_timeout)
            .map(|(&id, _)| id)
            .collect();
        for id in stale {
            if let Some(entry) = entries.remove(&id) {
                if let Some(close) = entry.close {
                    let _ = close.send(());
                }
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let entries = self.entries.lock();
        let now = Instant::now();
        let total = entries.len();
        let active = entries
            .values()
            .filter(|e| now.duration_since(e.last_activity) <= ACTIVE_WINDOW)
            .count();
        let total_messages: u64 = entries.values().map(|e| e.message_count).sum();
        let average_messages_per_connection = if total == 0 { 0.0 } else { total_messages as f64 / total as f64 };
        PoolStats {
            total,
            active,
            total_messages,
            average_messages_per_connection,
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
