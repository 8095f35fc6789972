// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control-plane client (§4.4): locate the daemon via the endpoint
//! locator file, connect, and exchange request/response frames.

use std::path::Path;
use std::time::Duration;

use pmd_core::{ErrorCode, PmdError, RequestEnvelope, ResponseEnvelope};
use tokio::net::TcpStream;

use crate::protocol::{self, ProtocolError};

/// A connection to a running daemon's control plane.
pub struct Client {
    stream: TcpStream,
    send_timeout: Duration,
}

impl Client {
    /// Read the locator at `locator_path` and connect within `connect_timeout`.
    pub async fn connect(locator_path: &Path, connect_timeout: Duration, send_timeout: Duration) -> Result<Self, PmdError> {
        let port = pmd_storage::locator::read(locator_path)
            .map_err(PmdError::from)?
            .ok_or_else(|| PmdError::new(ErrorCode::IpcConnectionFailed, "no daemon is running"))?;

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(("127.0.0.1", port)))
            .await
            .map_err(|_| PmdError::new(ErrorCode::IpcTimeout, "connect timed out"))?
            .map_err(|e| PmdError::new(ErrorCode::IpcConnectionFailed, e.to_string()))?;

        Ok(Self { stream, send_timeout })
    }

    /// Send one request and await its response, matched by `id`.
    pub async fn send(&mut self, request: &RequestEnvelope) -> Result<ResponseEnvelope, PmdError> {
        let bytes = serde_json::to_vec(request).map_err(ProtocolError::Json).map_err(PmdError::from)?;
        tokio::time::timeout(self.send_timeout, protocol::write_message(&mut self.stream, &bytes))
            .await
            .map_err(|_| PmdError::new(ErrorCode::IpcTimeout, "send timed out"))?
            .map_err(PmdError::from)?;

        let response_bytes = tokio::time::timeout(self.send_timeout, protocol::read_message(&mut self.stream))
            .await
            .map_err(|_| PmdError::new(ErrorCode::IpcTimeout, "response timed out"))?
            .map_err(PmdError::from)?;

        serde_json::from_slice(&response_bytes).map_err(|e| PmdError::new(ErrorCode::IpcConnectionFailed, e.to_string()))
    }

    /// Receive a further server-pushed frame on this connection (e.g. a
    /// `logs` follow-mode line), without sending a request first.
    pub async fn recv(&mut self) -> Result<ResponseEnvelope, PmdError> {
        let bytes = protocol::read_message(&mut self.stream).await.map_err(PmdError::from)?;
        serde_json::from_slice(&bytes).map_err(|e| PmdError::new(ErrorCode::IpcConnectionFailed, e.to_string()))
    }

    pub async fn disconnect(mut self) {
        use tokio::io::AsyncWriteExt;
        let _ = self.stream.shutdown().await;
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
