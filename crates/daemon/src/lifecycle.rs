// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown sequencing (§5).

use std::collections::BTreeMap;
use std::sync::Arc;

use pmd_core::{Clock, Config, DiscoveryRecord, SystemClock};
use pmd_engine::{LogPipeline, Monitor, Supervisor, SupervisorConfig};
use pmd_storage::PidLock;
use tokio::net::TcpListener;

use crate::errors::{IpcReconnectStrategy, ProcessRestartStrategy};
use crate::state::AppState;

pub struct Started {
    pub state: Arc<AppState>,
    pub tcp_listener: TcpListener,
    pub pid_lock: PidLock,
}

/// Acquire the PID lock, bind the control-plane listener, write the
/// endpoint locator, and wire up the Supervisor and its collaborators.
pub async fn startup(config: Config, pid: u32) -> Result<Started, pmd_core::PmdError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let record = DiscoveryRecord {
        pid,
        start_time: clock.wall_now(),
        socket_path: config.socket_path().display().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let pid_lock = PidLock::acquire(&config.pid_path(), &record)?;

    let probe = Arc::new(pmd_adapters::SystemResourceProbe::default());
    let monitor = Monitor::new(config.monitoring_interval, config.max_history, probe, clock.clone());
    let log_pipeline = LogPipeline::new(
        config.log_root.clone(),
        config.ring_capacity,
        config.max_log_size,
        config.max_rotations,
        config.max_in_flight_writes,
        config.intern_pool_cap,
        clock.clone(),
    );
    let supervisor_config = SupervisorConfig {
        grace_period: config.grace_period,
        base_restart_delay: config.base_restart_delay,
        max_restart_delay: config.max_restart_delay,
        memory_check_interval: config.memory_check_interval,
    };
    let child_adapter: Arc<dyn pmd_adapters::ChildProcessAdapter> = Arc::new(pmd_adapters::RealChildAdapter);
    let supervisor = Supervisor::new(supervisor_config, child_adapter, monitor, log_pipeline, clock.clone(), daemon_env());

    if let Some(snapshot) = pmd_storage::snapshot::FleetSnapshotFile::load(&config.snapshot_path())? {
        tracing::info!(processes = snapshot.processes.len(), "found a prior fleet snapshot (not auto-restored)");
    }

    let mut state = AppState::new(config.clone(), supervisor.clone(), clock, pid);
    state.recovery.register(Arc::new(ProcessRestartStrategy::new(supervisor)));

    let tcp_listener = crate::listener::bind(&state).await.map_err(|e| {
        pmd_core::PmdError::new(pmd_core::ErrorCode::IpcConnectionFailed, e.to_string())
    })?;
    let control_plane_addr = std::net::SocketAddr::from((std::net::Ipv4Addr::LOCALHOST, state.port()));
    state
        .recovery
        .register(Arc::new(IpcReconnectStrategy::new(control_plane_addr, config.connect_timeout)));

    pmd_storage::locator::write(&config.socket_path(), state.port())?;

    Ok(Started { state: Arc::new(state), tcp_listener, pid_lock })
}

fn daemon_env() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

/// Transmit the `shutdown` response before calling this (the listener
/// already does), then tear the daemon down in reverse dependency order:
/// the control plane's own state first, then persistence.
pub async fn shutdown(config: &Config, state: &Arc<AppState>, pid_lock: PidLock) -> Result<(), pmd_core::PmdError> {
    let instances = state.supervisor.list();
    let snapshot = pmd_storage::snapshot::FleetSnapshotFile::new(
        state.pid,
        state.start_time,
        config.socket_path().display().to_string(),
        &instances,
    );
    snapshot.save(&config.snapshot_path())?;

    pmd_storage::locator::remove(&config.socket_path())?;
    pid_lock.release()?;
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
