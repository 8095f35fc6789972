// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`ChildProcessAdapter`] for Supervisor tests: spawning never
//! touches the OS, and exit / output is driven by the test via
//! [`FakeChildEvent`] sent on a channel handed back at spawn time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{ChildError, ChildHandle, ChildProcessAdapter, ChildStream, ExitStatus, SpawnRequest};

/// An event a test injects into a fake child's lifecycle.
#[derive(Debug, Clone)]
pub enum FakeChildEvent {
    Line(ChildStream, String),
    Exit(ExitStatus),
}

/// Records every spawn request and hands back a sender the test drives.
#[derive(Clone, Default)]
pub struct FakeChildAdapter {
    next_pid: Arc<AtomicU32>,
    spawned: Arc<Mutex<Vec<(SpawnRequest, mpsc::Sender<FakeChildEvent>)>>>,
}

impl FakeChildAdapter {
    pub fn new() -> Self {
        Self {
            next_pid: Arc::new(AtomicU32::new(1000)),
            spawned: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sender for the `n`th spawned child (0-indexed), for driving its
    /// lifecycle from a test.
    pub fn driver(&self, n: usize) -> mpsc::Sender<FakeChildEvent> {
        self.spawned.lock()[n].1.clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().len()
    }

    /// The `n`th spawn's request, for asserting on computed env/cwd/script.
    pub fn request(&self, n: usize) -> SpawnRequest {
        self.spawned.lock()[n].0.clone()
    }
}

#[async_trait]
impl ChildProcessAdapter for FakeChildAdapter {
    async fn spawn(&self, req: SpawnRequest) -> Result<Box<dyn ChildHandle>, ChildError> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(64);
        self.spawned.lock().push((req, tx));
        Ok(Box::new(FakeChildHandle {
            pid,
            events: rx,
            terminated: false,
            exit_status: None,
        }))
    }
}

struct FakeChildHandle {
    pid: u32,
    events: mpsc::Receiver<FakeChildEvent>,
    terminated: bool,
    exit_status: Option<ExitStatus>,
}

#[async_trait]
impl ChildHandle for FakeChildHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn next_line(&mut self) -> Option<(ChildStream, String)> {
        loop {
            match self.events.recv().await? {
                FakeChildEvent::Line(s, l) => return Some((s, l)),
                FakeChildEvent::Exit(status) => {
                    self.exit_status = Some(status);
                    return None;
                }
            }
        }
    }

    async fn terminate(&mut self) -> Result<(), ChildError> {
        self.terminated = true;
        Ok(())
    }

    async fn kill(&mut self) -> Result<(), ChildError> {
        self.terminated = true;
        Ok(())
    }

    async fn wait(&mut self) -> Result<ExitStatus, ChildError> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        while let Some(event) = self.events.recv().await {
            if let FakeChildEvent::Exit(status) = event {
                self.exit_status = Some(status);
                return Ok(status);
            }
        }
        Ok(ExitStatus {
            code: Some(0),
            signaled: false,
        })
    }
}
