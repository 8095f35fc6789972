use tempfile::tempdir;

use super::*;

#[test]
fn write_then_read_round_trips_the_port() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.sock");
    write(&path, 4512).unwrap();
    assert_eq!(read(&path).unwrap(), Some(4512));
}

#[test]
fn read_missing_locator_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.sock");
    assert_eq!(read(&path).unwrap(), None);
}

#[test]
fn read_malformed_locator_returns_none_rather_than_erroring() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.sock");
    fs::write(&path, "not-a-port").unwrap();
    assert_eq!(read(&path).unwrap(), None);
}

#[test]
fn remove_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("daemon.sock");
    write(&path, 1).unwrap();
    remove(&path).unwrap();
    remove(&path).unwrap();
    assert!(!path.exists());
}
