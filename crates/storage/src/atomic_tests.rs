use tempfile::tempdir;

use super::*;

#[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
struct Widget {
    name: String,
    count: u32,
}

#[test]
fn write_then_read_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("widget.json");
    let w = Widget { name: "a".into(), count: 3 };

    write_json(&path, &w).unwrap();
    let loaded: Widget = read_json(&path).unwrap().unwrap();
    assert_eq!(loaded, w);
}

#[test]
fn read_missing_file_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let loaded: Option<Widget> = read_json(&path).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn write_leaves_no_tmp_file_behind() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("widget.json");
    write_json(&path, &Widget { name: "b".into(), count: 1 }).unwrap();
    assert!(!path.with_extension("tmp").exists());
    assert!(path.exists());
}

#[test]
fn remove_if_present_tolerates_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");
    remove_if_present(&path).unwrap();
}

#[test]
fn remove_if_present_removes_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("widget.json");
    write_json(&path, &Widget { name: "c".into(), count: 0 }).unwrap();
    remove_if_present(&path).unwrap();
    assert!(!path.exists());
}
