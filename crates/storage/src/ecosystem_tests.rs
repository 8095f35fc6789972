use std::collections::BTreeMap;
use std::path::PathBuf;

use pmd_core::ProcessSpec;
use tempfile::tempdir;

use super::*;

fn spec(id: &str) -> ProcessSpec {
    ProcessSpec {
        id: id.to_string(),
        name: id.to_string(),
        script: PathBuf::from("server.js"),
        cwd: PathBuf::from("."),
        env: BTreeMap::new(),
        instances: 2,
        autorestart: true,
        max_restarts: 5,
        memory_limit: Some(512_000_000),
    }
}

#[test]
fn save_then_load_round_trips_specs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ecosystem.json");
    let specs = vec![spec("web"), spec("worker")];

    save(&path, &specs).unwrap();
    let loaded = load(&path).unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, "web");
    assert_eq!(loaded[0].memory_limit, Some(512_000_000));
    assert_eq!(loaded[1].instances, 2);
}

#[test]
fn relative_script_and_cwd_resolve_against_file_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ecosystem.json");
    save(&path, &[spec("web")]).unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded[0].script, dir.path().join("server.js"));
    assert_eq!(loaded[0].cwd, dir.path());
}

#[test]
fn absolute_script_is_left_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ecosystem.json");
    let mut s = spec("web");
    s.script = PathBuf::from("/opt/app/server.js");
    save(&path, std::slice::from_ref(&s)).unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded[0].script, PathBuf::from("/opt/app/server.js"));
}

#[test]
fn memory_limit_unit_suffix_parses_from_raw_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ecosystem.json");
    std::fs::write(
        &path,
        r#"{
            "apps": [{"id":"web","name":"web","script":"a.js","cwd":".","memoryLimit":"512M"}],
            "version": "1.0.0",
            "created": "2026-01-01T00:00:00Z"
        }"#,
    )
    .unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded[0].memory_limit, Some(512_000_000));
}

#[test]
fn malformed_memory_limit_string_errs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ecosystem.json");
    std::fs::write(
        &path,
        r#"{
            "apps": [{"id":"web","name":"web","script":"a.js","cwd":".","memoryLimit":"not-a-size"}],
            "version": "1.0.0",
            "created": "2026-01-01T00:00:00Z"
        }"#,
    )
    .unwrap();

    assert!(load(&path).is_err());
}

#[test]
fn missing_optional_fields_use_documented_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ecosystem.json");
    std::fs::write(
        &path,
        r#"{
            "apps": [{"id":"web","name":"web","script":"a.js","cwd":"."}],
            "version": "1.0.0",
            "created": "2026-01-01T00:00:00Z"
        }"#,
    )
    .unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded[0].instances, 1);
    assert!(loaded[0].autorestart);
    assert_eq!(loaded[0].max_restarts, 0);
    assert_eq!(loaded[0].memory_limit, None);
}

#[test]
fn load_missing_file_errs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(load(&path).is_err());
}

#[test]
fn written_file_has_top_level_version_and_created_fields() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ecosystem.json");
    save(&path, &[spec("web")]).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], "1.0.0");
    assert!(raw["created"].is_string());
    assert_eq!(raw["apps"][0]["maxRestarts"], 5);
}
