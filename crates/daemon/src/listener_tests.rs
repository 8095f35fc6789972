use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pmd_adapters::{FakeChildAdapter, FakeResourceProbe};
use pmd_core::{Clock, Config, FakeClock, RequestEnvelope};
use pmd_engine::{LogPipeline, Monitor, Supervisor, SupervisorConfig};
use tempfile::tempdir;
use tokio::net::TcpStream;

use super::*;

fn harness(tmp: &tempfile::TempDir, idle_timeout: Duration) -> Arc<AppState> {
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
    let mut config = Config::with_daemon_dir(tmp.path().join("daemon"));
    config.idle_timeout = idle_timeout;
    config.pool_sweep_interval = Duration::from_millis(20);
    Arc::new(AppState::new(config, supervisor, clock, 1))
}

async fn roundtrip(stream: &mut TcpStream, command: &str, payload: serde_json::Value) -> serde_json::Value {
    let req = RequestEnvelope {
        id: "1".to_string(),
        command: command.to_string(),
        payload,
    };
    let bytes = serde_json::to_vec(&req).unwrap();
    protocol::write_message(stream, &bytes).await.unwrap();
    let resp_bytes = protocol::read_message(stream).await.unwrap();
    serde_json::from_slice(&resp_bytes).unwrap()
}

#[tokio::test]
async fn a_connection_serves_multiple_requests_in_sequence() {
    let tmp = tempdir().unwrap();
    let state = harness(&tmp, Duration::from_secs(300));
    let listener = bind(&state).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run(state.clone(), listener));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let resp: serde_json::Value = roundtrip(&mut stream, "list", serde_json::json!({})).await;
    assert_eq!(resp["success"], true);

    let resp: serde_json::Value = roundtrip(&mut stream, "status", serde_json::json!({})).await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["data"]["daemon"]["pid"], 1);
}

#[tokio::test]
async fn an_unknown_command_gets_an_error_response_without_closing_the_connection() {
    let tmp = tempdir().unwrap();
    let state = harness(&tmp, Duration::from_secs(300));
    let listener = bind(&state).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run(state.clone(), listener));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let resp = roundtrip(&mut stream, "bogus", serde_json::json!({})).await;
    assert_eq!(resp["success"], false);

    let resp = roundtrip(&mut stream, "list", serde_json::json!({})).await;
    assert_eq!(resp["success"], true);
}

#[tokio::test]
async fn the_sweeper_closes_connections_idle_past_the_timeout() {
    let tmp = tempdir().unwrap();
    let state = harness(&tmp, Duration::from_millis(30));
    let listener = bind(&state).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run(state.clone(), listener));
    tokio::spawn(run_sweeper(state.clone()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let _ = roundtrip(&mut stream, "list", serde_json::json!({})).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut len_buf = [0u8; 4];
    use tokio::io::AsyncReadExt;
    let result = stream.read_exact(&mut len_buf).await;
    assert!(result.is_err() || result.unwrap() == 0);
}
