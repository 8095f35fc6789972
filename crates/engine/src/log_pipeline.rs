// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-Instance capture of stdout/stderr: bounded in-memory tail, rotating
//! on-disk persistence, and live-follow for readers (§4.2).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pmd_core::{Clock, InstanceId, LogEntry, Stream};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Semaphore};

use crate::error::LogPipelineError;
use crate::intern::InternPool;
use crate::log_paths::{rotated_path, stream_log_path};
use crate::ring::Ring;

const HISTORY_WINDOW: usize = 50;

struct PipelineEntry {
    ring: Ring<LogEntry>,
    intern: InternPool,
    tx: broadcast::Sender<LogEntry>,
    write_permits: Arc<Semaphore>,
    stopped: bool,
}

#[derive(Clone)]
pub struct LogPipeline {
    log_root: PathBuf,
    ring_capacity: usize,
    max_log_size: u64,
    max_rotations: u32,
    max_in_flight: usize,
    intern_cap: usize,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<HashMap<InstanceId, PipelineEntry>>>,
}

impl LogPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        log_root: PathBuf,
        ring_capacity: usize,
        max_log_size: u64,
        max_rotations: u32,
        max_in_flight: usize,
        intern_cap: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            log_root,
            ring_capacity,
            max_log_size,
            max_rotations,
            max_in_flight,
            intern_cap,
            clock,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Begin tracking an instance's log state. Idempotent: calling twice
    /// replaces the prior in-memory state (used when a restarted Instance
    /// reuses the same `instanceId`).
    pub fn register(&self, instance_id: InstanceId) {
        let (tx, _rx) = broadcast::channel(1024);
        self.state.lock().insert(
            instance_id,
            PipelineEntry {
                ring: Ring::new(self.ring_capacity),
                intern: InternPool::new(self.intern_cap),
                tx,
                write_permits: Arc::new(Semaphore::new(self.max_in_flight)),
                stopped: false,
            },
        );
    }

    /// Capture one complete line from a child stream: timestamp, push to
    /// the ring, broadcast to live subscribers, and persist to disk.
    ///
    /// Disk writes are async and backpressured: at most `max_in_flight`
    /// writes per instance may be outstanding before this call awaits a
    /// free slot.
    pub async fn capture(&self, instance_id: &InstanceId, stream: Stream, message: String) {
        let (entry, permits) = {
            let mut state = self.state.lock();
            let Some(entry) = state.get_mut(instance_id) else {
                return;
            };
            if entry.stopped {
                return;
            }
            let log_entry = LogEntry {
                timestamp: self.clock.wall_now(),
                instance_id: instance_id.clone(),
                stream,
                message,
            };
            entry.intern.intern(instance_id.as_str());
            entry.ring.push(log_entry.clone());
            let _ = entry.tx.send(log_entry.clone());
            (log_entry, entry.write_permits.clone())
        };

        let Ok(permit) = permits.acquire_owned().await else {
            return;
        };
        let path = stream_log_path(&self.log_root, instance_id, stream);
        let max_log_size = self.max_log_size;
        let max_rotations = self.max_rotations;
        tokio::spawn(async move {
            if let Err(e) = write_line(&path, &entry.format_line(), max_log_size, max_rotations).await {
                tracing::warn!(instance_id = %entry.instance_id, error = %e, "failed to write log line");
            }
            drop(permit);
        });
    }

    /// Last `n` formatted lines, preferring the in-memory ring and falling
    /// back to on-disk history for the remainder.
    pub async fn get_logs(&self, instance_id: &InstanceId, n: usize) -> Result<Vec<String>, LogPipelineError> {
        let (ring_lines, oldest_ring_ts, have_entry) = {
            let state = self.state.lock();
            match state.get(instance_id) {
                Some(entry) => {
                    let tail = entry.ring.tail(n);
                    let oldest = entry.ring.iter().next().map(|e| e.timestamp);
                    (
                        tail.iter().map(|e| e.format_line()).collect::<Vec<_>>(),
                        oldest,
                        true,
                    )
                }
                None => (Vec::new(), None, false),
            }
        };
        if !have_entry {
            return Err(LogPipelineError::NotFound(instance_id.as_str().to_string()));
        }
        if ring_lines.len() >= n {
            return Ok(ring_lines);
        }

        let needed = n - ring_lines.len();
        let mut disk_lines = read_disk_history(&self.log_root, instance_id, self.max_rotations, oldest_ring_ts).await;
        if disk_lines.len() > needed {
            let skip = disk_lines.len() - needed;
            disk_lines.drain(0..skip);
        }
        disk_lines.extend(ring_lines);
        Ok(disk_lines)
    }

    /// Subscribe to this instance's live stream: a short history window
    /// followed by every line written after subscription, exactly once and
    /// in order per stream.
    pub fn stream_logs(
        &self,
        instance_id: &InstanceId,
    ) -> Option<(Vec<LogEntry>, broadcast::Receiver<LogEntry>)> {
        let state = self.state.lock();
        let entry = state.get(instance_id)?;
        let history = entry.ring.tail(HISTORY_WINDOW).into_iter().cloned().collect();
        Some((history, entry.tx.subscribe()))
    }

    /// Shift the on-disk rotation chain for both streams.
    pub async fn rotate_logs(&self, instance_id: &InstanceId) -> Result<(), LogPipelineError> {
        for stream in [Stream::Stdout, Stream::Stderr] {
            let path = stream_log_path(&self.log_root, instance_id, stream);
            rotate_chain(&path, self.max_rotations).await?;
        }
        Ok(())
    }

    /// Cancel capture: no further writes are accepted, but retained state
    /// (ring, files) is left in place.
    pub fn stop_capture(&self, instance_id: &InstanceId) {
        let mut state = self.state.lock();
        if let Some(entry) = state.get_mut(instance_id) {
            entry.stopped = true;
            entry.ring.clear();
        }
        state.remove(instance_id);
    }

    /// As [`Self::stop_capture`], additionally removing all on-disk files.
    pub async fn cleanup_logs(&self, instance_id: &InstanceId) -> Result<(), LogPipelineError> {
        self.stop_capture(instance_id);
        let dir = crate::log_paths::instance_dir(&self.log_root, instance_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LogPipelineError::Io(e)),
        }
    }
}

async fn write_line(path: &Path, line: &str, max_log_size: u64, max_rotations: u32) -> Result<(), LogPipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let existing_len = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
    if existing_len + line.len() as u64 + 1 > max_log_size && existing_len > 0 {
        rotate_chain(path, max_rotations).await?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
}

async fn rotate_chain(base: &Path, max_rotations: u32) -> Result<(), LogPipelineError> {
    if !base.exists() {
        return Ok(());
    }
    let oldest = rotated_path(base, max_rotations);
    if oldest.exists() {
        fs::remove_file(&oldest).await?;
    }
    for n in (1..max_rotations).rev() {
        let src = rotated_path(base, n);
        if fs::try_exists(&src).await.unwrap_or(false) {
            fs::rename(&src, rotated_path(base, n + 1)).await?;
        }
    }
    fs::rename(base, rotated_path(base, 1)).await?;
    Ok(())
}

/// Read formatted lines from on-disk rotation files older than
/// `before_ring_oldest`, oldest-rotation-first so the caller can take a
/// trailing slice and keep chronological order.
async fn read_disk_history(
    log_root: &Path,
    instance_id: &InstanceId,
    max_rotations: u32,
    before_ring_oldest: Option<DateTime<Utc>>,
) -> Vec<String> {
    let mut candidates: Vec<(DateTime<Utc>, String)> = Vec::new();
    for stream in [Stream::Stdout, Stream::Stderr] {
        let base = stream_log_path(log_root, instance_id, stream);
        let mut paths = vec![base.clone()];
        for n in 1..=max_rotations {
            paths.push(rotated_path(&base, n));
        }
        for path in paths {
            if let Ok(content) = fs::read_to_string(&path).await {
                for line in content.lines() {
                    if let Some(ts) = parse_line_timestamp(line) {
                        if before_ring_oldest.is_none_or(|cutoff| ts < cutoff) {
                            candidates.push((ts, line.to_string()));
                        }
                    }
                }
            }
        }
    }
    candidates.sort_by_key(|(ts, _)| *ts);
    candidates.into_iter().map(|(_, line)| line).collect()
}

fn parse_line_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let inner = line.strip_prefix('[')?;
    let (ts, _) = inner.split_once(']')?;
    DateTime::parse_from_rfc3339(ts).ok().map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "log_pipeline_tests.rs"]
mod tests;
