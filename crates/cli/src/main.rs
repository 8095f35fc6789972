// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pmctl - thin client for the pmd process supervisor daemon.

mod daemon_process;
mod env;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pmd_core::{Config, RequestEnvelope};
use pmd_daemon::Client;
use serde_json::json;

#[derive(Parser)]
#[command(name = "pmctl", version, about = "Control the pmd process supervisor daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a process from a spec file (JSON: id, name, script, cwd, env, instances, autorestart, maxRestarts, memoryLimit)
    Start {
        spec_file: PathBuf,
    },
    /// Stop a running process by id, id prefix, or name
    Stop {
        identifier: String,
    },
    /// Restart a running process by id, id prefix, or name
    Restart {
        identifier: String,
    },
    /// List every managed process
    List,
    /// Scale a process to a new instance count
    Scale {
        identifier: String,
        instances: u32,
    },
    /// Delete a process spec and stop all of its instances
    Delete {
        identifier: String,
    },
    /// Show recent log lines, or follow them live
    Logs {
        identifier: String,
        #[arg(long, short)]
        follow: bool,
        #[arg(long, short = 'n', default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show resource metrics for every instance
    Monit,
    /// Show one process's spec, metrics, and history
    Show {
        identifier: String,
    },
    /// Save the current fleet to an ecosystem file
    Save {
        file_path: PathBuf,
    },
    /// Load process specs from an ecosystem file
    Load {
        file_path: PathBuf,
        #[arg(long)]
        app_name: Option<String>,
    },
    /// Report daemon status
    Status,
    /// Shut the daemon down
    Shutdown,
    /// Report aggregate error statistics
    ErrorStats,
    /// Report recent recorded errors
    Errors {
        #[arg(long, short, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load();

    let (command, payload) = build_request(&cli.command)?;
    let follow = matches!(cli.command, Command::Logs { follow: true, .. });

    let mut client = connect(&config).await?;
    let request = RequestEnvelope {
        id: request_id(),
        command: command.clone(),
        payload,
    };
    let response = client.send(&request).await.context("sending request to daemon")?;
    let success = response.success;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if follow && success {
        loop {
            match client.recv().await {
                Ok(pushed) => println!("{}", serde_json::to_string_pretty(&pushed)?),
                Err(_) => break,
            }
        }
        return Ok(());
    }

    client.disconnect().await;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn build_request(command: &Command) -> Result<(String, serde_json::Value)> {
    let (command, payload) = match command {
        Command::Start { spec_file } => {
            let text = std::fs::read_to_string(spec_file)
                .with_context(|| format!("reading {}", spec_file.display()))?;
            let spec: serde_json::Value = serde_json::from_str(&text)?;
            ("start", json!({ "spec": spec }))
        }
        Command::Stop { identifier } => ("stop", json!({ "identifier": identifier })),
        Command::Restart { identifier } => ("restart", json!({ "identifier": identifier })),
        Command::List => ("list", json!({})),
        Command::Scale { identifier, instances } => ("scale", json!({ "id": identifier, "instances": instances })),
        Command::Delete { identifier } => ("delete", json!({ "identifier": identifier })),
        Command::Logs { identifier, follow, limit, filter } => (
            "logs",
            json!({ "identifier": identifier, "follow": follow, "lines": limit, "filter": filter }),
        ),
        Command::Monit => ("monit", json!({})),
        Command::Show { identifier } => ("show", json!({ "identifier": identifier })),
        Command::Save { file_path } => ("save", json!({ "filePath": file_path.display().to_string() })),
        Command::Load { file_path, app_name } => (
            "load",
            json!({ "filePath": file_path.display().to_string(), "appName": app_name }),
        ),
        Command::Status => ("status", json!({})),
        Command::Shutdown => ("shutdown", json!({})),
        Command::ErrorStats => ("errorStats", json!({})),
        Command::Errors { limit } => ("errors", json!({ "limit": limit })),
    };
    Ok((command.to_string(), payload))
}

async fn connect(config: &Config) -> Result<Client> {
    let connect_timeout = env::timeout_connect_ms().unwrap_or(config.connect_timeout);
    let send_timeout = env::timeout_send_ms().unwrap_or(config.send_timeout);

    if let Ok(client) = Client::connect(&config.socket_path(), connect_timeout, send_timeout).await {
        return Ok(client);
    }

    daemon_process::cleanup_stale_files(config);
    daemon_process::start_daemon_background().context("spawning pmd")?;
    if !daemon_process::wait_for_ready(config, Duration::from_secs(5)).await {
        bail!("daemon did not become ready in time");
    }

    Client::connect(&config.socket_path(), connect_timeout, send_timeout)
        .await
        .context("connecting to freshly started daemon")
}

fn request_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("pmctl-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
