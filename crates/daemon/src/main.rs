// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pmd: the process supervisor daemon's binary entrypoint.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use pmd_core::Config;
use pmd_daemon::lifecycle::{self, Started};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("pmd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("pmd {}", env!("CARGO_PKG_VERSION"));
                println!("Process supervisor daemon — listens on a loopback TCP port for commands from `pmctl`.");
                println!();
                println!("USAGE:");
                println!("    pmd");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: pmd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load();
    let log_path = config.daemon_dir.join("daemon.log");
    rotate_log_if_needed(&log_path);
    write_startup_marker(&log_path)?;
    let log_guard = setup_logging(&log_path)?;

    info!("starting pmd");

    let pid = std::process::id();
    let Started { state, tcp_listener, pid_lock } = match lifecycle::startup(config.clone(), pid).await {
        Ok(started) => started,
        Err(e) => {
            write_startup_error(&log_path, &e);
            error!(error = %e, "failed to start daemon");
            drop(log_guard);
            return Err(Box::new(std::io::Error::other(e.to_string())));
        }
    };

    tokio::spawn(pmd_daemon::listener::run(state.clone(), tcp_listener));
    tokio::spawn(pmd_daemon::listener::run_sweeper(state.clone()));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    info!(port = state.port(), "daemon ready");
    println!("READY");

    tokio::select! {
        _ = state.shutdown.notified() => info!("shutdown requested via command"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = sighup.recv() => info!("received SIGHUP, shutting down"),
    }
    state.shutdown.notify_waiters();

    lifecycle::shutdown(&config, &state, pid_lock).await?;
    info!("daemon stopped");
    Ok(())
}

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: u32 = 3;

/// Shifts `daemon.log` → `daemon.log.1` → `daemon.log.2` → `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently ignored
/// so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

const STARTUP_MARKER_PREFIX: &str = "--- pmd: starting (pid: ";

/// Appends a marker to the log before tracing initializes, so a CLI
/// diagnostic can find where the current startup attempt begins.
fn write_startup_marker(log_path: &std::path::Path) -> std::io::Result<()> {
    use std::io::Write;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())
}

fn write_startup_error(log_path: &std::path::Path, error: &pmd_core::PmdError) {
    use std::io::Write;
    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(log_path) else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {error}");
}

fn setup_logging(log_path: &std::path::Path) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = log_path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "log path has no parent"))?;
    std::fs::create_dir_all(parent)?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "log path has no file name"))?;
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
