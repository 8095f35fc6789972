// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command Handlers (§4.5): thin adapters from wire verbs to Supervisor /
//! State Manager operations, responsible for payload validation and
//! response shape. `dispatch` is the single entry point the listener calls
//! per request frame.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pmd_core::{ErrorCode, Instance, InstanceId, PmdError, ProcessSpec, RequestEnvelope, ResponseEnvelope};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::mpsc;

use crate::state::AppState;

/// Wire shape for a [`ProcessSpec`], matching §6's camelCase field names —
/// distinct from the core model's snake_case fields, same split as the
/// ecosystem file's on-disk shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireProcessSpec {
    id: String,
    name: String,
    script: PathBuf,
    cwd: PathBuf,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default = "default_instances")]
    instances: u32,
    #[serde(default = "default_autorestart")]
    autorestart: bool,
    #[serde(rename = "maxRestarts", default)]
    max_restarts: u32,
    #[serde(
        rename = "memoryLimit",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_memory_limit",
        serialize_with = "ser_memory_limit"
    )]
    memory_limit: Option<u64>,
}

fn default_instances() -> u32 {
    1
}

fn default_autorestart() -> bool {
    true
}

fn de_memory_limit<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let value: Option<serde_json::Value> = Option::deserialize(d)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_u64()),
        Some(serde_json::Value::String(s)) => pmd_core::units::parse_memory(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("malformed memoryLimit {s:?}"))),
        Some(other) => Err(D::Error::custom(format!("memoryLimit must be a number or string, got {other}"))),
    }
}

fn ser_memory_limit<S: Serializer>(v: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(n) => s.serialize_some(n),
        None => s.serialize_none(),
    }
}

impl From<&ProcessSpec> for WireProcessSpec {
    fn from(s: &ProcessSpec) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            script: s.script.clone(),
            cwd: s.cwd.clone(),
            env: s.env.clone(),
            instances: s.instances,
            autorestart: s.autorestart,
            max_restarts: s.max_restarts,
            memory_limit: s.memory_limit,
        }
    }
}

impl From<WireProcessSpec> for ProcessSpec {
    fn from(w: WireProcessSpec) -> Self {
        ProcessSpec {
            id: w.id,
            name: w.name,
            script: w.script,
            cwd: w.cwd,
            env: w.env,
            instances: w.instances,
            autorestart: w.autorestart,
            max_restarts: w.max_restarts,
            memory_limit: w.memory_limit,
        }
    }
}

/// Wire shape for an [`Instance`]: `{instanceId,pid,status,startTime,restartCount}`.
#[derive(Debug, Clone, Serialize)]
struct WireInstance {
    #[serde(rename = "instanceId")]
    instance_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    status: pmd_core::InstanceStatus,
    #[serde(rename = "startTime")]
    start_time: DateTime<Utc>,
    #[serde(rename = "restartCount")]
    restart_count: u32,
}

impl From<&Instance> for WireInstance {
    fn from(i: &Instance) -> Self {
        Self {
            instance_id: i.instance_id.as_str().to_string(),
            pid: i.pid,
            status: i.status,
            start_time: i.start_time,
            restart_count: i.restart_count,
        }
    }
}

fn wire_instances(instances: &[Instance]) -> Vec<WireInstance> {
    instances.iter().map(WireInstance::from).collect()
}

fn bad_payload(e: impl std::fmt::Display) -> PmdError {
    PmdError::new(ErrorCode::InvalidConfiguration, format!("invalid payload: {e}"))
}

fn parse_payload<T: serde::de::DeserializeOwned>(payload: &serde_json::Value) -> Result<T, PmdError> {
    serde_json::from_value(payload.clone()).map_err(bad_payload)
}

fn not_found(identifier: &str) -> PmdError {
    PmdError::new(ErrorCode::FileNotFound, format!("no process matches identifier {identifier:?}"))
        .with_context("identifier", identifier)
}

/// Resolve `identifier` to the spec it names, per §4.5's three-step order,
/// additionally falling back to specs with no live instances.
fn resolve_spec_id(state: &AppState, identifier: &str) -> Option<String> {
    if state.supervisor.spec(identifier).is_some() {
        return Some(identifier.to_string());
    }
    let matches = state.supervisor.resolve(identifier);
    if let Some(first) = matches.first() {
        if let Some(instance) = state.supervisor.list().into_iter().find(|i| &i.instance_id == first) {
            return Some(instance.spec_id);
        }
    }
    state.supervisor.specs().into_iter().find(|s| s.name == identifier).map(|s| s.id)
}

/// Dispatch one request to its handler, producing a response with the same
/// `id`. `push` lets a handler (currently only `logs` in follow mode) emit
/// further frames under the same `id` after the initial response.
pub async fn dispatch(
    state: &Arc<AppState>,
    req: &RequestEnvelope,
    push: &mpsc::UnboundedSender<ResponseEnvelope>,
) -> ResponseEnvelope {
    let result = route(state, &req.command, &req.payload, push).await;
    match result {
        Ok(data) => ResponseEnvelope::ok(req.id.clone(), data),
        Err(error) => {
            state.error_log.record(&error, false);
            let recovered = state.recovery.try_recover(&error).await;
            if recovered {
                state.error_log.record(&error, true);
            }
            ResponseEnvelope::err(req.id.clone(), error.user_message())
        }
    }
}

async fn route(
    state: &Arc<AppState>,
    command: &str,
    payload: &serde_json::Value,
    push: &mpsc::UnboundedSender<ResponseEnvelope>,
) -> Result<serde_json::Value, PmdError> {
    match command {
        "start" => handle_start(state, payload).await,
        "stop" => handle_stop(state, payload).await,
        "restart" => handle_restart(state, payload).await,
        "list" => handle_list(state),
        "scale" => handle_scale(state, payload).await,
        "delete" => handle_delete(state, payload).await,
        "logs" => handle_logs(state, payload, push).await,
        "monit" => handle_monit(state).await,
        "show" => handle_show(state, payload),
        "save" => handle_save(state, payload),
        "load" => handle_load(state, payload, None).await,
        "startFromFile" => handle_load_from_file(state, payload).await,
        "status" => handle_status(state),
        "shutdown" => handle_shutdown(state),
        "errorStats" => handle_error_stats(state),
        "errors" => handle_errors(state, payload),
        other => Err(PmdError::new(ErrorCode::InvalidConfiguration, format!("Unknown command: {other}"))),
    }
}

#[derive(Deserialize)]
struct StartPayload {
    spec: WireProcessSpec,
}

async fn handle_start(state: &AppState, payload: &serde_json::Value) -> Result<serde_json::Value, PmdError> {
    let parsed: StartPayload = parse_payload(payload)?;
    let spec: ProcessSpec = parsed.spec.into();
    let id = spec.id.clone();
    let instances = state.supervisor.start(spec).await?;
    Ok(serde_json::json!({
        "message": format!("started {id}"),
        "instances": wire_instances(&instances),
    }))
}

#[derive(Deserialize)]
struct IdentifierPayload {
    identifier: String,
}

async fn handle_stop(state: &AppState, payload: &serde_json::Value) -> Result<serde_json::Value, PmdError> {
    let parsed: IdentifierPayload = parse_payload(payload)?;
    let matches = state.supervisor.resolve(&parsed.identifier);
    if matches.is_empty() {
        return Err(not_found(&parsed.identifier));
    }
    for instance_id in &matches {
        state.supervisor.stop(instance_id).await?;
    }
    Ok(serde_json::json!({
        "message": format!("stopped {}", parsed.identifier),
        "stoppedInstances": matches.iter().map(InstanceId::as_str).collect::<Vec<_>>(),
    }))
}

async fn handle_restart(state: &AppState, payload: &serde_json::Value) -> Result<serde_json::Value, PmdError> {
    let parsed: IdentifierPayload = parse_payload(payload)?;
    let matches = state.supervisor.resolve(&parsed.identifier);
    if matches.is_empty() {
        return Err(not_found(&parsed.identifier));
    }
    let mut instances = Vec::with_capacity(matches.len());
    for instance_id in &matches {
        instances.push(state.supervisor.restart(instance_id).await?);
    }
    Ok(serde_json::json!({
        "message": format!("restarted {}", parsed.identifier),
        "instances": wire_instances(&instances),
    }))
}

fn handle_list(state: &AppState) -> Result<serde_json::Value, PmdError> {
    Ok(serde_json::json!({ "processes": wire_instances(&state.supervisor.list()) }))
}

#[derive(Deserialize)]
struct ScalePayload {
    id: String,
    instances: u32,
}

async fn handle_scale(state: &AppState, payload: &serde_json::Value) -> Result<serde_json::Value, PmdError> {
    let parsed: ScalePayload = parse_payload(payload)?;
    let instances = state.supervisor.scale(&parsed.id, parsed.instances).await?;
    Ok(serde_json::json!({
        "message": format!("scaled {} to {}", parsed.id, parsed.instances),
        "instances": wire_instances(&instances),
    }))
}

async fn handle_delete(state: &AppState, payload: &serde_json::Value) -> Result<serde_json::Value, PmdError> {
    let parsed: IdentifierPayload = parse_payload(payload)?;
    let spec_id = resolve_spec_id(state, &parsed.identifier).ok_or_else(|| not_found(&parsed.identifier))?;
    let spec = state.supervisor.spec(&spec_id).ok_or_else(|| not_found(&parsed.identifier))?;
    let stopped: Vec<String> = state
        .supervisor
        .list()
        .into_iter()
        .filter(|i| i.spec_id == spec_id)
        .map(|i| i.instance_id.as_str().to_string())
        .collect();
    state.supervisor.delete(&spec_id).await?;
    Ok(serde_json::json!({
        "message": format!("deleted {spec_id}"),
        "processId": spec_id,
        "processName": spec.name,
        "stoppedInstances": stopped,
        "removedLogs": true,
    }))
}

#[derive(Deserialize)]
struct LogsPayload {
    identifier: String,
    #[serde(default = "default_log_lines")]
    lines: usize,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    follow: bool,
}

fn default_log_lines() -> usize {
    100
}

async fn handle_logs(
    state: &Arc<AppState>,
    payload: &serde_json::Value,
    push: &mpsc::UnboundedSender<ResponseEnvelope>,
) -> Result<serde_json::Value, PmdError> {
    let parsed: LogsPayload = parse_payload(payload)?;
    let instance_id = state
        .supervisor
        .resolve(&parsed.identifier)
        .into_iter()
        .next()
        .ok_or_else(|| not_found(&parsed.identifier))?;

    if parsed.follow {
        spawn_log_follower(state.clone(), instance_id.clone(), parsed.filter.clone(), push.clone());
        return Ok(serde_json::json!({ "streaming": true, "processId": instance_id.as_str() }));
    }

    let log_pipeline = state.supervisor.log_pipeline();
    let lines = log_pipeline
        .get_logs(&instance_id, parsed.lines)
        .await
        .map_err(PmdError::from)?;
    let total_lines = lines.len();
    let filtered: Vec<&String> = match &parsed.filter {
        Some(f) => lines.iter().filter(|l| l.contains(f.as_str())).collect(),
        None => lines.iter().collect(),
    };
    let filtered_lines = filtered.len();
    Ok(serde_json::json!({
        "processId": instance_id.as_str(),
        "lines": filtered,
        "totalLines": total_lines,
        "filteredLines": filtered_lines,
    }))
}

/// Push further log frames under `request.id` as they arrive, per the
/// documented extension to §9's open question on `logs` streaming: genuine
/// server-pushed frames rather than client polling.
fn spawn_log_follower(
    state: Arc<AppState>,
    instance_id: InstanceId,
    filter: Option<String>,
    push: mpsc::UnboundedSender<ResponseEnvelope>,
) {
    tokio::spawn(async move {
        let Some((_, mut rx)) = state.supervisor.log_pipeline().stream_logs(&instance_id) else {
            return;
        };
        loop {
            match rx.recv().await {
                Ok(entry) => {
                    if filter.as_ref().is_some_and(|f| !entry.message.contains(f.as_str())) {
                        continue;
                    }
                    let frame = ResponseEnvelope::ok(
                        instance_id.as_str(),
                        serde_json::json!({ "processId": instance_id.as_str(), "line": entry.format_line() }),
                    );
                    if push.send(frame).is_err() {
                        return;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    });
}

async fn handle_monit(state: &AppState) -> Result<serde_json::Value, PmdError> {
    let instances = state.supervisor.list();
    let monitor = state.supervisor.monitor();
    let processes: Vec<serde_json::Value> = instances
        .iter()
        .map(|i| {
            let metrics = monitor.get_metrics(&i.instance_id);
            serde_json::json!({
                "instanceId": i.instance_id.as_str(),
                "pid": i.pid,
                "status": i.status,
                "startTime": i.start_time,
                "restartCount": i.restart_count,
                "metrics": metrics.map(metric_json),
            })
        })
        .collect();
    let system_info = monitor.get_system_info().await;
    Ok(serde_json::json!({
        "processes": processes,
        "systemInfo": {
            "totalMemory": system_info.total_memory,
            "freeMemory": system_info.free_memory,
            "cpuCount": system_info.cpu_count,
        },
    }))
}

fn metric_json(m: pmd_core::MetricSample) -> serde_json::Value {
    serde_json::json!({
        "cpuPercent": m.cpu_percent,
        "rssBytes": m.rss_bytes,
        "uptimeSec": m.uptime_sec,
        "restartCount": m.restart_count,
    })
}

fn handle_show(state: &AppState, payload: &serde_json::Value) -> Result<serde_json::Value, PmdError> {
    let parsed: IdentifierPayload = parse_payload(payload)?;
    let instance_id = state
        .supervisor
        .resolve(&parsed.identifier)
        .into_iter()
        .next()
        .ok_or_else(|| not_found(&parsed.identifier))?;
    let instance = state
        .supervisor
        .list()
        .into_iter()
        .find(|i| i.instance_id == instance_id)
        .ok_or_else(|| not_found(&parsed.identifier))?;
    let spec = state.supervisor.spec(&instance.spec_id);
    let monitor = state.supervisor.monitor();
    let metrics = monitor.get_metrics(&instance_id);
    let history = monitor.get_history(&instance_id);
    Ok(serde_json::json!({
        "process": spec.as_ref().map(WireProcessSpec::from),
        "metrics": metrics.map(metric_json),
        "history": history.into_iter().map(metric_json).collect::<Vec<_>>(),
    }))
}

#[derive(Deserialize)]
struct FilePathPayload {
    #[serde(rename = "filePath")]
    file_path: PathBuf,
}

fn handle_save(state: &AppState, payload: &serde_json::Value) -> Result<serde_json::Value, PmdError> {
    let parsed: FilePathPayload = parse_payload(payload)?;
    let specs = state.supervisor.specs();
    if let Some(parent) = parsed.file_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| PmdError::new(ErrorCode::FileNotFound, e.to_string()).with_context("filePath", parsed.file_path.display().to_string()))?;
    }
    pmd_storage::ecosystem::save(&parsed.file_path, &specs).map_err(PmdError::from)?;
    Ok(serde_json::json!({
        "message": format!("saved {} processes", specs.len()),
        "processCount": specs.len(),
        "processes": specs.iter().map(WireProcessSpec::from).collect::<Vec<_>>(),
    }))
}

#[derive(Deserialize)]
struct LoadPayload {
    #[serde(rename = "filePath")]
    file_path: PathBuf,
    #[serde(rename = "appName", default)]
    app_name: Option<String>,
}

async fn handle_load(
    state: &AppState,
    payload: &serde_json::Value,
    forced_app_name: Option<String>,
) -> Result<serde_json::Value, PmdError> {
    let parsed: LoadPayload = parse_payload(payload)?;
    let app_name = forced_app_name.or(parsed.app_name);
    let specs = pmd_storage::ecosystem::load(&parsed.file_path).map_err(PmdError::from)?;
    let total_apps = specs.len();
    let mut success_count = 0usize;
    let mut results = Vec::with_capacity(total_apps);
    for spec in specs {
        if let Some(name) = &app_name {
            if &spec.name != name {
                continue;
            }
        }
        let id = spec.id.clone();
        if state.supervisor.spec(&id).is_some() {
            results.push(serde_json::json!({ "id": id, "success": false, "error": "already admitted" }));
            continue;
        }
        match state.supervisor.start(spec).await {
            Ok(_) => {
                success_count += 1;
                results.push(serde_json::json!({ "id": id, "success": true }));
            }
            Err(e) => {
                let err: PmdError = e.into();
                results.push(serde_json::json!({ "id": id, "success": false, "error": err.user_message() }));
            }
        }
    }
    Ok(serde_json::json!({
        "message": format!("loaded {success_count}/{total_apps} processes"),
        "totalApps": total_apps,
        "successCount": success_count,
        "results": results,
    }))
}

async fn handle_load_from_file(state: &AppState, payload: &serde_json::Value) -> Result<serde_json::Value, PmdError> {
    let parsed: LoadPayload = parse_payload(payload)?;
    handle_load(state, payload, parsed.app_name).await
}

fn handle_status(state: &AppState) -> Result<serde_json::Value, PmdError> {
    Ok(serde_json::json!({
        "daemon": {
            "pid": state.pid,
            "uptime": state.uptime_secs(),
            "endpoint": format!("127.0.0.1:{}", state.port()),
            "processCount": state.supervisor.specs().len(),
            "connections": state.pool.stats(),
        }
    }))
}

fn handle_shutdown(_state: &AppState) -> Result<serde_json::Value, PmdError> {
    Ok(serde_json::json!({ "message": "shutting down" }))
}

fn handle_error_stats(state: &AppState) -> Result<serde_json::Value, PmdError> {
    serde_json::to_value(state.error_log.stats()).map_err(|e| PmdError::new(ErrorCode::UnknownError, e.to_string()))
}

fn handle_errors(state: &AppState, payload: &serde_json::Value) -> Result<serde_json::Value, PmdError> {
    #[derive(Deserialize, Default)]
    struct LimitPayload {
        limit: Option<usize>,
    }
    let parsed: LimitPayload = if payload.is_null() { LimitPayload::default() } else { parse_payload(payload)? };
    let tail = state.error_log.tail(parsed.limit.unwrap_or(100));
    Ok(serde_json::json!({ "errors": tail }))
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
