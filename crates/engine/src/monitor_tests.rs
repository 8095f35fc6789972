// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pmd_adapters::{FakeResourceProbe, ResourceSample};
use pmd_core::FakeClock;
use std::time::Duration;

fn monitor(probe: Arc<FakeResourceProbe>, clock: Arc<FakeClock>) -> Monitor {
    Monitor::new(Duration::from_secs(5), 100, probe, clock)
}

#[tokio::test]
async fn start_takes_an_immediate_sample() {
    let probe = Arc::new(FakeResourceProbe::new());
    probe.set(
        42,
        ResourceSample {
            cpu_percent: 10.0,
            rss_bytes: 2048,
        },
    );
    let clock = Arc::new(FakeClock::new());
    let mon = monitor(probe, clock);
    let id = InstanceId::new("a");
    mon.start(id.clone(), 42);

    // allow the spawned task's first sample to land
    tokio::time::sleep(Duration::from_millis(20)).await;

    let metrics = mon.get_metrics(&id).expect("sample recorded");
    assert_eq!(metrics.rss_bytes, 2048);
    assert_eq!(metrics.cpu_percent, 10.0);
}

#[tokio::test]
async fn failed_probe_records_zero_sample() {
    let probe = Arc::new(FakeResourceProbe::new());
    let clock = Arc::new(FakeClock::new());
    let mon = monitor(probe, clock);
    let id = InstanceId::new("b");
    mon.start(id.clone(), 999);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let metrics = mon.get_metrics(&id).expect("zero sample recorded");
    assert_eq!(metrics.rss_bytes, 0);
    assert_eq!(metrics.cpu_percent, 0.0);
}

#[tokio::test]
async fn memory_limit_exactly_at_rss_does_not_trigger() {
    let probe = Arc::new(FakeResourceProbe::new());
    probe.set(
        1,
        ResourceSample {
            cpu_percent: 0.0,
            rss_bytes: 1000,
        },
    );
    let clock = Arc::new(FakeClock::new());
    let mon = monitor(probe, clock);
    let id = InstanceId::new("c");
    mon.start(id.clone(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!mon.check_memory_limit(&id, 1000));
    assert!(mon.check_memory_limit(&id, 999));
}

#[tokio::test]
async fn stop_without_clear_retains_history() {
    let probe = Arc::new(FakeResourceProbe::new());
    probe.set(
        1,
        ResourceSample {
            cpu_percent: 1.0,
            rss_bytes: 1,
        },
    );
    let clock = Arc::new(FakeClock::new());
    let mon = monitor(probe, clock);
    let id = InstanceId::new("d");
    mon.start(id.clone(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;

    mon.stop(&id, false);
    assert!(!mon.get_history(&id).is_empty());
}

#[tokio::test]
async fn stop_with_clear_drops_history() {
    let probe = Arc::new(FakeResourceProbe::new());
    probe.set(
        1,
        ResourceSample {
            cpu_percent: 1.0,
            rss_bytes: 1,
        },
    );
    let clock = Arc::new(FakeClock::new());
    let mon = monitor(probe, clock);
    let id = InstanceId::new("e");
    mon.start(id.clone(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;

    mon.stop(&id, true);
    assert!(mon.get_history(&id).is_empty());
    assert!(mon.get_metrics(&id).is_none());
}
