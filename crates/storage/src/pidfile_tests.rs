use chrono::Utc;
use tempfile::tempdir;

use super::*;

fn record() -> DiscoveryRecord {
    DiscoveryRecord {
        pid: std::process::id(),
        start_time: Utc::now(),
        socket_path: "4512".to_string(),
        version: "0.1.0".to_string(),
    }
}

#[test]
fn acquire_then_read_round_trips_the_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.pid");
    let rec = record();
    let _lock = PidLock::acquire(&path, &rec).unwrap();

    let loaded = read(&path).unwrap().unwrap();
    assert_eq!(loaded.pid, rec.pid);
    assert_eq!(loaded.socket_path, rec.socket_path);
}

#[test]
fn acquire_twice_on_same_path_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.pid");
    let _first = PidLock::acquire(&path, &record()).unwrap();

    let err = PidLock::acquire(&path, &record()).unwrap_err();
    assert!(matches!(err, StorageError::AlreadyLocked(_)));
}

#[test]
fn release_removes_the_file_and_frees_the_lock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.pid");
    let lock = PidLock::acquire(&path, &record()).unwrap();
    lock.release().unwrap();

    assert!(!path.exists());
    // Lock is free again now that the file (and the flock on it) are gone.
    let _relocked = PidLock::acquire(&path, &record()).unwrap();
}

#[test]
fn dropping_the_lock_without_release_frees_it_for_reacquisition() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.pid");
    {
        let _lock = PidLock::acquire(&path, &record()).unwrap();
    }
    let _reacquired = PidLock::acquire(&path, &record()).unwrap();
}

#[test]
fn read_missing_pidfile_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.pid");
    assert!(read(&path).unwrap().is_none());
}

#[test]
fn is_process_alive_true_for_self_false_for_unused_pid() {
    assert!(is_process_alive(std::process::id()));
    // Default pid_max on Linux is 4194304; this is well past it.
    assert!(!is_process_alive(9_999_999));
}
