// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real child-process backend: spawns via `tokio::process`, captures stdout
//! and stderr through an `mpsc` channel fed by two reader tasks, and signals
//! via `nix` (`SIGTERM` then `SIGKILL`).

use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::{ChildError, ChildHandle, ChildProcessAdapter, ChildStream, ExitStatus, SpawnRequest};

#[derive(Default)]
pub struct RealChildAdapter;

#[async_trait]
impl ChildProcessAdapter for RealChildAdapter {
    async fn spawn(&self, req: SpawnRequest) -> Result<Box<dyn ChildHandle>, ChildError> {
        let mut cmd = Command::new(&req.script);
        cmd.current_dir(&req.cwd)
            .envs(&req.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child: Child = cmd.spawn().map_err(|e| ChildError::SpawnFailed(e.to_string()))?;
        let pid = child.id().ok_or_else(|| ChildError::SpawnFailed("no pid".into()))?;

        let stdout = child.stdout.take().ok_or_else(|| ChildError::SpawnFailed("no stdout".into()))?;
        let stderr = child.stderr.take().ok_or_else(|| ChildError::SpawnFailed("no stderr".into()))?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(pump_lines(stdout, ChildStream::Stdout, tx.clone()));
        tokio::spawn(pump_lines(stderr, ChildStream::Stderr, tx));

        Ok(Box::new(RealChildHandle {
            pid,
            child,
            lines: rx,
        }))
    }
}

async fn pump_lines<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    stream: ChildStream,
    tx: mpsc::Sender<(ChildStream, String)>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send((stream, line)).await.is_err() {
                    return;
                }
            }
            _ => return,
        }
    }
}

struct RealChildHandle {
    pid: u32,
    child: Child,
    lines: mpsc::Receiver<(ChildStream, String)>,
}

#[async_trait]
impl ChildHandle for RealChildHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn next_line(&mut self) -> Option<(ChildStream, String)> {
        self.lines.recv().await
    }

    async fn terminate(&mut self) -> Result<(), ChildError> {
        signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM)
            .map_err(|e| ChildError::SignalFailed(e.to_string()))
    }

    async fn kill(&mut self) -> Result<(), ChildError> {
        self.child
            .kill()
            .await
            .map_err(|e| ChildError::SignalFailed(e.to_string()))
    }

    async fn wait(&mut self) -> Result<ExitStatus, ChildError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ChildError::SignalFailed(e.to_string()))?;
        Ok(ExitStatus {
            code: status.code(),
            signaled: status.code().is_none(),
        })
    }
}
