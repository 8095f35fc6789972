use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pmd_adapters::{FakeChildAdapter, FakeResourceProbe};
use pmd_core::{Clock, Config, FakeClock};
use pmd_engine::{LogPipeline, Monitor, Supervisor, SupervisorConfig};
use tempfile::tempdir;

use super::*;
use crate::listener;
use crate::state::AppState;

fn harness(tmp: &tempfile::TempDir) -> Arc<AppState> {
    let adapter: Arc<dyn pmd_adapters::ChildProcessAdapter> = Arc::new(FakeChildAdapter::new());
    let probe = Arc::new(FakeResourceProbe::new());
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new());
    let monitor = Monitor::new(Duration::from_secs(5), 100, probe, clock.clone());
    let log_pipeline = LogPipeline::new(tmp.path().to_path_buf(), 100, 1024 * 1024, 3, 10, 64, clock.clone());
    let supervisor_config = SupervisorConfig {
        grace_period: Duration::from_millis(10),
        base_restart_delay: Duration::from_millis(5),
        max_restart_delay: Duration::from_millis(20),
        memory_check_interval: Duration::from_millis(15),
    };
    let supervisor = Supervisor::new(supervisor_config, adapter, monitor, log_pipeline, clock.clone(), BTreeMap::new());
    let config = Config::with_daemon_dir(tmp.path().join("daemon"));
    Arc::new(AppState::new(config, supervisor, clock, 1))
}

#[tokio::test]
async fn connect_fails_cleanly_when_no_locator_file_exists() {
    let tmp = tempdir().unwrap();
    let err = Client::connect(&tmp.path().join("daemon.sock"), Duration::from_millis(200), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err.code, pmd_core::ErrorCode::IpcConnectionFailed);
}

#[tokio::test]
async fn connect_then_send_round_trips_a_request() {
    let tmp = tempdir().unwrap();
    let state = harness(&tmp);
    let tcp_listener = listener::bind(&state).await.unwrap();
    tokio::spawn(listener::run(state.clone(), tcp_listener));

    let locator_path = tmp.path().join("daemon.sock");
    pmd_storage::locator::write(&locator_path, state.port()).unwrap();

    let mut client = Client::connect(&locator_path, Duration::from_secs(1), Duration::from_secs(1)).await.unwrap();
    let resp = client
        .send(&pmd_core::RequestEnvelope {
            id: "1".to_string(),
            command: "status".to_string(),
            payload: serde_json::json!({}),
        })
        .await
        .unwrap();
    assert!(resp.success);
    client.disconnect().await;
}
