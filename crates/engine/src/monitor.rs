// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic sampling of per-Instance resource usage into bounded history,
//! and the memory-limit predicate the Supervisor consults (§4.3).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pmd_adapters::ResourceProbe;
use pmd_core::{Clock, InstanceId, MetricSample};
use tokio::sync::Notify;

use crate::ring::Ring;

struct Tracked {
    pid: u32,
    start_instant: Instant,
    current: Option<MetricSample>,
    history: Ring<MetricSample>,
    cancel: Arc<Notify>,
}

/// Per-Instance periodic sampler. Cheap to clone: internal state is
/// `Arc`-shared, matching the teacher's background-collector idiom.
#[derive(Clone)]
pub struct Monitor {
    interval: Duration,
    max_history: usize,
    probe: Arc<dyn ResourceProbe>,
    clock: Arc<dyn Clock>,
    tracked: Arc<Mutex<HashMap<InstanceId, Tracked>>>,
}

impl Monitor {
    pub fn new(
        interval: Duration,
        max_history: usize,
        probe: Arc<dyn ResourceProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            interval,
            max_history,
            probe,
            clock,
            tracked: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register an instance and schedule sampling every `interval`, taking
    /// one initial sample immediately.
    pub fn start(&self, instance_id: InstanceId, pid: u32) {
        let cancel = Arc::new(Notify::new());
        {
            let mut tracked = self.tracked.lock();
            tracked.insert(
                instance_id.clone(),
                Tracked {
                    pid,
                    start_instant: self.clock.now(),
                    current: None,
                    history: Ring::new(self.max_history),
                    cancel: cancel.clone(),
                },
            );
        }

        let this = self.clone();
        tokio::spawn(async move {
            this.sample_once(&instance_id, pid).await;
            let mut ticker = tokio::time::interval(this.interval);
            ticker.tick().await; // first tick fires immediately; already sampled above
            loop {
                tokio::select! {
                    _ = cancel.notified() => return,
                    _ = ticker.tick() => this.sample_once(&instance_id, pid).await,
                }
            }
        });
    }

    /// Cancel the sampling timer. `clear_history` additionally drops the
    /// retained ring, per the caller's choice (§4.3).
    pub fn stop(&self, instance_id: &InstanceId, clear_history: bool) {
        let mut tracked = self.tracked.lock();
        if let Some(mut t) = tracked.remove(instance_id) {
            t.cancel.notify_waiters();
            if !clear_history {
                tracked.insert(instance_id.clone(), t);
            }
        }
    }

    async fn sample_once(&self, instance_id: &InstanceId, pid: u32) {
        let sample = self.probe.sample(pid).await;
        let (cpu_percent, rss_bytes) = match sample {
            Some(s) => (s.cpu_percent, s.rss_bytes),
            None => (0.0, 0),
        };

        let mut tracked = self.tracked.lock();
        if let Some(t) = tracked.get_mut(instance_id) {
            let uptime_sec = self.clock.now().saturating_duration_since(t.start_instant).as_secs();
            let metric = MetricSample {
                timestamp: self.clock.wall_now(),
                cpu_percent,
                rss_bytes,
                uptime_sec,
                restart_count: 0,
            };
            t.current = Some(metric);
            t.history.push(metric);
        }
    }

    /// Current sample augmented with live uptime. `restart_count` is left at
    /// `0`; the caller (Supervisor) overlays the value it owns.
    pub fn get_metrics(&self, instance_id: &InstanceId) -> Option<MetricSample> {
        let tracked = self.tracked.lock();
        let t = tracked.get(instance_id)?;
        let mut sample = t.current?;
        sample.uptime_sec = self.clock.now().saturating_duration_since(t.start_instant).as_secs();
        Some(sample)
    }

    pub fn get_history(&self, instance_id: &InstanceId) -> Vec<MetricSample> {
        let tracked = self.tracked.lock();
        tracked
            .get(instance_id)
            .map(|t| t.history.iter().copied().collect())
            .unwrap_or_default()
    }

    /// `rss > limit`; exactly-at-limit does not trigger (§8 boundary).
    pub fn check_memory_limit(&self, instance_id: &InstanceId, limit: u64) -> bool {
        let tracked = self.tracked.lock();
        tracked
            .get(instance_id)
            .and_then(|t| t.current)
            .map(|s| s.rss_bytes > limit)
            .unwrap_or(false)
    }

    pub async fn get_system_info(&self) -> pmd_adapters::SystemInfo {
        self.probe.system_info().await
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
