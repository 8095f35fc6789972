// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use pmd_adapters::{FakeChildAdapter, FakeChildEvent, FakeResourceProbe, ResourceSample};
use pmd_core::{FakeClock, InstanceStatus, ProcessSpec};
use tempfile::tempdir;

use super::*;

fn spec(id: &str, instances: u32, max_restarts: u32, memory_limit: Option<u64>) -> ProcessSpec {
    ProcessSpec {
        id: id.to_string(),
        name: id.to_string(),
        script: PathBuf::from("echo-loop"),
        cwd: PathBuf::from("/tmp"),
        env: BTreeMap::new(),
        instances,
        autorestart: true,
        max_restarts,
        memory_limit,
    }
}

struct Harness {
    supervisor: Supervisor,
    adapter: Arc<FakeChildAdapter>,
    probe: Arc<FakeResourceProbe>,
    _tmp: tempfile::TempDir,
}

fn harness() -> Harness {
    let adapter = Arc::new(FakeChildAdapter::new());
    let probe = Arc::new(FakeResourceProbe::new());
    let clock: Arc<dyn pmd_core::Clock> = Arc::new(FakeClock::new());
    let tmp = tempdir().unwrap();
    let monitor = Monitor::new(Duration::from_secs(5), 100, probe.clone(), clock.clone());
    let log_pipeline = LogPipeline::new(tmp.path().to_path_buf(), 100, 1024 * 1024, 3, 10, 64, clock.clone());
    let config = SupervisorConfig {
        grace_period: Duration::from_millis(10),
        base_restart_delay: Duration::from_millis(5),
        max_restart_delay: Duration::from_millis(20),
        memory_check_interval: Duration::from_millis(15),
    };
    let supervisor = Supervisor::new(
        config,
        adapter.clone() as Arc<dyn pmd_adapters::ChildProcessAdapter>,
        monitor,
        log_pipeline,
        clock,
        BTreeMap::new(),
    );
    Harness {
        supervisor,
        adapter,
        probe,
        _tmp: tmp,
    }
}

#[tokio::test]
async fn start_and_list_single_instance() {
    let h = harness();
    let instances = h.supervisor.start(spec("a", 1, 3, None)).await.unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].instance_id.as_str(), "a");
    assert_eq!(instances[0].status, InstanceStatus::Running);
    assert_eq!(instances[0].restart_count, 0);

    let listed = h.supervisor.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].instance_id.as_str(), "a");
}

#[tokio::test]
async fn duplicate_start_fails() {
    let h = harness();
    h.supervisor.start(spec("a", 1, 3, None)).await.unwrap();
    let err = h.supervisor.start(spec("a", 1, 3, None)).await.unwrap_err();
    assert!(matches!(err, SupervisorError::DuplicateId(_)));
}

#[tokio::test]
async fn clustered_spec_assigns_sequential_ports() {
    let h = harness();
    let mut s = spec("c", 3, 3, None);
    s.env.insert("PORT".to_string(), "4000".to_string());
    h.supervisor.start(s).await.unwrap();

    let ports: Vec<String> = (0..3)
        .map(|i| h.adapter.request(i).env.get("PORT").cloned().unwrap())
        .collect();
    assert_eq!(ports, vec!["4000", "4001", "4002"]);
}

#[tokio::test]
async fn manual_stop_wins_over_subsequent_crash() {
    let h = harness();
    let instances = h.supervisor.start(spec("b", 1, 3, None)).await.unwrap();
    let instance_id = instances[0].instance_id.clone();

    let sup = h.supervisor.clone();
    let iid = instance_id.clone();
    let stop_handle = tokio::spawn(async move { sup.stop(&iid).await });

    // let stop() mark status=Stopped and signal termination before the child "exits"
    tokio::time::sleep(Duration::from_millis(30)).await;
    h.adapter
        .driver(0)
        .send(FakeChildEvent::Exit(pmd_adapters::ExitStatus {
            code: Some(1),
            signaled: false,
        }))
        .await
        .unwrap();

    stop_handle.await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(h.supervisor.list().is_empty());
    assert!(h.supervisor.get_restart_stats(&instance_id).is_err());
}

#[tokio::test]
async fn crash_with_autorestart_exhausts_restart_ceiling() {
    let h = harness();
    let max_restarts = 2;
    let instances = h.supervisor.start(spec("d", 1, max_restarts, None)).await.unwrap();
    let instance_id = instances[0].instance_id.clone();

    for spawn_index in 0..=max_restarts {
        h.adapter
            .driver(spawn_index as usize)
            .send(FakeChildEvent::Exit(pmd_adapters::ExitStatus {
                code: Some(1),
                signaled: false,
            }))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    let listed = h.supervisor.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, InstanceStatus::Errored);
    assert_eq!(listed[0].restart_count, max_restarts);
    assert_eq!(h.adapter.spawn_count(), (max_restarts + 1) as usize);
}

#[tokio::test]
async fn clean_exit_removes_instance_without_restart() {
    let h = harness();
    let instances = h.supervisor.start(spec("e", 1, 3, None)).await.unwrap();
    let instance_id = instances[0].instance_id.clone();

    h.adapter
        .driver(0)
        .send(FakeChildEvent::Exit(pmd_adapters::ExitStatus {
            code: Some(0),
            signaled: false,
        }))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert!(h.supervisor.list().is_empty());
    assert_eq!(h.adapter.spawn_count(), 1);
    let _ = instance_id;
}

#[tokio::test]
async fn scale_to_current_count_is_noop() {
    let h = harness();
    h.supervisor.start(spec("f", 2, 3, None)).await.unwrap();
    let before = h.supervisor.list().len();
    let scaled = h.supervisor.scale("f", 2).await.unwrap();
    assert_eq!(scaled.len(), before);
    assert_eq!(h.adapter.spawn_count(), 2);
}

#[tokio::test]
async fn scale_to_zero_fails_validation() {
    let h = harness();
    h.supervisor.start(spec("g", 1, 3, None)).await.unwrap();
    let err = h.supervisor.scale("g", 0).await.unwrap_err();
    assert!(matches!(err, SupervisorError::InvalidScale(_)));
}

#[tokio::test]
async fn scale_up_spawns_additional_instances() {
    let h = harness();
    h.supervisor.start(spec("k", 1, 3, None)).await.unwrap();
    let scaled = h.supervisor.scale("k", 3).await.unwrap();
    assert_eq!(scaled.len(), 3);
    let mut ids: Vec<_> = scaled.iter().map(|i| i.instance_id.as_str().to_string()).collect();
    ids.sort();
    assert_eq!(ids, vec!["k_0", "k_1", "k_2"]);
}

#[tokio::test]
async fn scale_down_stops_highest_indexed_surplus() {
    let h = harness();
    h.supervisor.start(spec("m", 3, 3, None)).await.unwrap();
    let scaled = h.supervisor.scale("m", 1).await.unwrap();
    assert_eq!(scaled.len(), 1);
    assert_eq!(scaled[0].instance_id.as_str(), "m_0");
}

#[tokio::test]
async fn memory_limit_exceeded_triggers_restart() {
    let h = harness();
    h.probe.set(
        1000,
        ResourceSample {
            cpu_percent: 0.0,
            rss_bytes: 100,
        },
    );
    let instances = h
        .supervisor
        .start(spec("mem", 1, 5, Some(50)))
        .await
        .unwrap();
    let instance_id = instances[0].instance_id.clone();
    assert_eq!(instances[0].pid, Some(1000));

    // allow the watchdog's first tick to observe the over-limit sample
    tokio::time::sleep(Duration::from_millis(120)).await;

    let stats = h.supervisor.get_restart_stats(&instance_id).unwrap();
    assert!(stats.restart_count >= 1, "expected at least one restart, got {stats:?}");
}
