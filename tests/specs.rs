//! End-to-end scenarios for the process supervisor daemon's control plane.
//!
//! Each test drives the real command dispatch path (`pmd_daemon::handlers::dispatch`)
//! against a `Supervisor` backed by fake child/probe/clock adapters, so the
//! scenarios run deterministically and at full speed while still exercising
//! the same wire-shape parsing and response building the daemon uses.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pmd_adapters::{ExitStatus, FakeChildAdapter, FakeChildEvent, FakeResourceProbe, ResourceSample};
use pmd_core::{Clock, Config, FakeClock, RequestEnvelope};
use pmd_daemon::handlers::dispatch;
use pmd_daemon::AppState;
use pmd_engine::{LogPipeline, Monitor, Supervisor, SupervisorConfig};
use tempfile::tempdir;
use tokio::sync::mpsc;

struct Harness {
    state: Arc<AppState>,
    adapter: Arc<FakeChildAdapter>,
    probe: Arc<FakeResourceProbe>,
    _tmp: tempfile::TempDir,
}

fn harness() -> Harness {
    let tmp = tempdir().expect("tempdir");
    let adapter = Arc::new(FakeChildAdapter::new());
    let probe = Arc::new(FakeResourceProbe::new());
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new());
    let monitor = Monitor::new(Duration::from_secs(5), 100, probe.clone(), clock.clone());
    let log_pipeline = LogPipeline::new(tmp.path().to_path_buf(), 100, 1024 * 1024, 3, 10, 64, clock.clone());
    let supervisor_config = SupervisorConfig {
        grace_period: Duration::from_millis(10),
        base_restart_delay: Duration::from_millis(5),
        max_restart_delay: Duration::from_millis(20),
        memory_check_interval: Duration::from_millis(15),
    };
    let supervisor = Supervisor::new(
        supervisor_config,
        adapter.clone() as Arc<dyn pmd_adapters::ChildProcessAdapter>,
        monitor,
        log_pipeline,
        clock.clone(),
        BTreeMap::new(),
    );
    let config = Config::with_daemon_dir(tmp.path().join("daemon"));
    let state = Arc::new(AppState::new(config, supervisor, clock, 4242));
    Harness {
        state,
        adapter,
        probe,
        _tmp: tmp,
    }
}

fn req(command: &str, payload: serde_json::Value) -> RequestEnvelope {
    RequestEnvelope {
        id: "1".to_string(),
        command: command.to_string(),
        payload,
    }
}

fn spec(id: &str, instances: u32, max_restarts: u32, memory_limit: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "spec": {
            "id": id,
            "name": id,
            "script": "echo-loop",
            "cwd": "/tmp",
            "instances": instances,
            "autorestart": true,
            "maxRestarts": max_restarts,
            "memoryLimit": memory_limit,
        }
    })
}

fn exit(code: i32) -> FakeChildEvent {
    FakeChildEvent::Exit(ExitStatus {
        code: Some(code),
        signaled: false,
    })
}

#[tokio::test]
async fn spawn_and_list_reports_one_running_instance() {
    let h = harness();
    let (tx, _rx) = mpsc::unbounded_channel();

    let resp = dispatch(&h.state, &req("start", spec("a", 1, 3, None)), &tx).await;
    assert!(resp.success, "{:?}", resp.error);

    let resp = dispatch(&h.state, &req("list", serde_json::json!({})), &tx).await;
    let data = resp.data.unwrap();
    let processes = data["processes"].as_array().unwrap();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0]["instanceId"], "a");
    assert_eq!(processes[0]["status"], "running");
    assert_eq!(processes[0]["restartCount"], 0);
}

#[tokio::test]
async fn crash_with_autorestart_settles_errored_at_the_restart_ceiling() {
    let h = harness();
    let (tx, _rx) = mpsc::unbounded_channel();
    let max_restarts = 3;

    dispatch(&h.state, &req("start", spec("b", 1, max_restarts, None)), &tx).await;

    for spawn_index in 0..=max_restarts {
        h.adapter.driver(spawn_index as usize).send(exit(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    let resp = dispatch(&h.state, &req("list", serde_json::json!({})), &tx).await;
    let processes = resp.data.unwrap()["processes"].as_array().unwrap().clone();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0]["status"], "errored");
    assert_eq!(processes[0]["restartCount"], max_restarts);
}

#[tokio::test]
async fn manual_stop_wins_over_a_crash_that_follows_it() {
    let h = harness();
    let (tx, _rx) = mpsc::unbounded_channel();

    dispatch(&h.state, &req("start", spec("b", 1, 3, None)), &tx).await;

    let state = h.state.clone();
    let (stop_tx, _stop_rx) = mpsc::unbounded_channel();
    let stop_handle = tokio::spawn(async move {
        dispatch(&state, &req("stop", serde_json::json!({"identifier": "b"})), &stop_tx).await
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    h.adapter.driver(0).send(exit(1)).await.unwrap();

    let stop_resp = stop_handle.await.unwrap();
    assert!(stop_resp.success, "{:?}", stop_resp.error);
    tokio::time::sleep(Duration::from_millis(30)).await;

    let resp = dispatch(&h.state, &req("list", serde_json::json!({})), &tx).await;
    assert_eq!(resp.data.unwrap()["processes"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn clustered_spec_assigns_sequential_ports_to_each_instance() {
    let h = harness();
    let (tx, _rx) = mpsc::unbounded_channel();

    let mut payload = spec("c", 3, 3, None);
    payload["spec"]["env"] = serde_json::json!({"PORT": "4000"});
    let resp = dispatch(&h.state, &req("start", payload), &tx).await;
    assert!(resp.success, "{:?}", resp.error);

    let ports: Vec<String> = (0..3).map(|i| h.adapter.request(i).env.get("PORT").cloned().unwrap()).collect();
    assert_eq!(ports, vec!["4000", "4001", "4002"]);
}

#[tokio::test]
async fn logs_tail_returns_the_last_n_lines_in_order() {
    let h = harness();
    let (tx, _rx) = mpsc::unbounded_channel();

    dispatch(&h.state, &req("start", spec("c", 1, 3, None)), &tx).await;
    let instance_id = pmd_core::InstanceId::new("c");
    for n in 1..=150 {
        h.state
            .supervisor
            .log_pipeline()
            .capture(&instance_id, pmd_core::Stream::Stdout, format!("L{n}"))
            .await;
    }

    let resp = dispatch(
        &h.state,
        &req("logs", serde_json::json!({"identifier": "c", "lines": 100})),
        &tx,
    )
    .await;
    assert!(resp.success, "{:?}", resp.error);
    let data = resp.data.unwrap();
    let lines: Vec<String> = data["lines"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(lines.len(), 100);
    assert!(lines.first().unwrap().contains("L51"));
    assert!(lines.last().unwrap().contains("L150"));
}

#[tokio::test]
async fn memory_limit_exceeded_triggers_a_restart_with_a_new_pid() {
    let h = harness();
    let (tx, _rx) = mpsc::unbounded_channel();
    let limit = 50 * 1024 * 1024u64;

    h.probe.set(
        1000,
        ResourceSample {
            cpu_percent: 0.0,
            rss_bytes: limit + 1,
        },
    );

    let resp = dispatch(&h.state, &req("start", spec("mem", 1, 5, Some(&limit.to_string()))), &tx).await;
    assert!(resp.success, "{:?}", resp.error);
    let first_pid = resp.data.unwrap()["instances"][0]["pid"].as_u64();
    assert_eq!(first_pid, Some(1000));

    tokio::time::sleep(Duration::from_millis(120)).await;

    let resp = dispatch(&h.state, &req("list", serde_json::json!({})), &tx).await;
    let processes = resp.data.unwrap()["processes"].as_array().unwrap().clone();
    assert_eq!(processes.len(), 1);
    assert!(processes[0]["restartCount"].as_u64().unwrap() >= 1);
}
