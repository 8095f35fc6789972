// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control plane's TCP listener (§4.4, §6): a loopback accept loop plus
//! one read-loop task per connection that lives across many request/response
//! frames, and a periodic sweep that evicts idle connections.

use std::sync::Arc;

use pmd_core::ResponseEnvelope;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::handlers::dispatch;
use crate::protocol::{self, DEFAULT_SEND_TIMEOUT};
use crate::state::AppState;

/// Bind the loopback listener on an OS-assigned ephemeral port and write it
/// into `state`, returning the bound listener for [`run`] to accept on.
pub async fn bind(state: &AppState) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let port = listener.local_addr()?.port();
    state.set_port(port);
    Ok(listener)
}

/// Accept connections until `state.shutdown` fires, handing each off to its
/// own read-loop task.
pub async fn run(state: Arc<AppState>, listener: TcpListener) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        tracing::debug!(%addr, "accepted control-plane connection");
                        tokio::spawn(handle_connection(state.clone(), stream));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }
            _ = state.shutdown.notified() => {
                tracing::info!("listener shutting down");
                return;
            }
        }
    }
}

/// Run `pool.sweep()` on `pool_sweep_interval` until shutdown.
pub async fn run_sweeper(state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(state.config.pool_sweep_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => state.pool.sweep(),
            _ = state.shutdown.notified() => return,
        }
    }
}

async fn handle_connection(state: Arc<AppState>, stream: TcpStream) {
    let handle = state.pool.register();
    let conn_id = handle.id;
    let mut closed = handle.closed;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<ResponseEnvelope>();

    loop {
        tokio::select! {
            frame = protocol::read_request(&mut reader) => {
                let request = match frame {
                    Ok(r) => r,
                    Err(_) => break,
                };
                state.pool.touch(conn_id);
                let response = dispatch(&state, &request, &push_tx).await;
                let is_shutdown = request.command == "shutdown";
                if protocol::write_response(&mut write_half, &response, DEFAULT_SEND_TIMEOUT).await.is_err() {
                    break;
                }
                if is_shutdown {
                    state.shutdown.notify_waiters();
                }
            }
            Some(pushed) = push_rx.recv() => {
                if protocol::write_response(&mut write_half, &pushed, DEFAULT_SEND_TIMEOUT).await.is_err() {
                    break;
                }
            }
            _ = &mut closed => {
                tracing::debug!(conn_id, "connection force-closed by pool");
                break;
            }
        }
    }

    let _ = write_half.shutdown().await;
    state.pool.unregister(conn_id);
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
