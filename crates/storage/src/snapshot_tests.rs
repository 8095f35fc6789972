use chrono::Utc;
use pmd_core::{Instance, InstanceId, InstanceStatus};
use tempfile::tempdir;

use super::*;

fn instance(id: &str, restart_count: u32) -> Instance {
    let mut i = Instance::new(InstanceId::new(id), "spec-a", Utc::now());
    i.pid = Some(1234);
    i.restart_count = restart_count;
    i
}

#[test]
fn save_then_load_round_trips_the_fleet() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.json");
    let now = Utc::now();
    let instances = vec![instance("a", 0), instance("b", 2)];

    let snap = FleetSnapshotFile::new(999, now, "4512", &instances);
    snap.save(&path).unwrap();

    let loaded = FleetSnapshotFile::load(&path).unwrap().unwrap();
    assert_eq!(loaded.pid, 999);
    assert_eq!(loaded.socket_path, "4512");
    assert_eq!(loaded.processes.len(), 2);
    assert_eq!(loaded.processes[&InstanceId::new("b")].restart_count, 2);
}

#[test]
fn load_missing_snapshot_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.json");
    assert!(FleetSnapshotFile::load(&path).unwrap().is_none());
}

#[test]
fn save_leaves_no_tmp_file_behind() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.json");
    FleetSnapshotFile::new(1, Utc::now(), "1", &[]).save(&path).unwrap();
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn wire_shape_matches_the_documented_field_names() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.json");
    FleetSnapshotFile::new(42, Utc::now(), "4512", &[instance("a", 1)])
        .save(&path)
        .unwrap();

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["pid"], 42);
    assert!(raw["startTime"].is_string());
    assert_eq!(raw["socketPath"], "4512");
    assert_eq!(raw["processes"]["a"]["restartCount"], 1);
    assert_eq!(raw["processes"]["a"]["status"], "running");
}

#[test]
fn empty_fleet_serializes_as_empty_processes_map() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.json");
    FleetSnapshotFile::new(1, Utc::now(), "1", &[]).save(&path).unwrap();

    let loaded = FleetSnapshotFile::load(&path).unwrap().unwrap();
    assert!(loaded.processes.is_empty());
}
