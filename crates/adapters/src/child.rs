// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable child-process backend for the Supervisor: spawn with piped
//! stdio, signal gracefully then forcefully, and wait for exit. Mirrors the
//! shape of a tmux-session adapter, but the "session" here is an OS process.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChildError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("child {0} not found")]
    NotFound(String),
    #[error("signal delivery failed: {0}")]
    SignalFailed(String),
}

/// One line of captured output from a child's stdout or stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStream {
    Stdout,
    Stderr,
}

/// The outcome of a child process that has exited.
#[derive(Debug, Clone, Copy)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signaled: bool,
}

impl ExitStatus {
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A handle through which the Supervisor drives one spawned child: read its
/// output lines, signal it, and wait for it to exit.
#[async_trait]
pub trait ChildHandle: Send + Sync {
    fn pid(&self) -> u32;

    /// Read the next captured line, tagged with which stream it came from.
    /// Returns `None` once both streams are closed (EOF).
    async fn next_line(&mut self) -> Option<(ChildStream, String)>;

    /// Send a graceful-termination signal (`SIGTERM` on POSIX).
    async fn terminate(&mut self) -> Result<(), ChildError>;

    /// Send a forceful kill signal (`SIGKILL` on POSIX).
    async fn kill(&mut self) -> Result<(), ChildError>;

    /// Wait for the child to exit and report its status.
    async fn wait(&mut self) -> Result<ExitStatus, ChildError>;
}

/// Parameters for spawning one instance.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub script: PathBuf,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

/// Adapter boundary between the Supervisor and the OS process API.
#[async_trait]
pub trait ChildProcessAdapter: Send + Sync {
    async fn spawn(&self, req: SpawnRequest) -> Result<Box<dyn ChildHandle>, ChildError>;
}

#[cfg(unix)]
pub mod real;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeChildAdapter, FakeChildEvent};
#[cfg(unix)]
pub use real::RealChildAdapter;

#[cfg(test)]
#[path = "child_tests.rs"]
mod tests;
