// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Supervisor: admits `ProcessSpec`s, spawns and reaps child processes,
//! and runs the restart/memory-limit policy described in §4.1.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pmd_adapters::{ChildHandle, ChildProcessAdapter, ChildStream, ExitStatus, SpawnRequest};
use pmd_core::{restart_delay, Clock, Instance, InstanceId, InstanceStatus, ProcessSpec, Stream};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::error::SupervisorError;
use crate::log_pipeline::LogPipeline;
use crate::monitor::Monitor;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub grace_period: Duration,
    pub base_restart_delay: Duration,
    pub max_restart_delay: Duration,
    pub memory_check_interval: Duration,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RestartStats {
    pub restart_count: u32,
    pub max_restarts: u32,
    pub can_restart: bool,
}

enum ControlMsg {
    Stop(oneshot::Sender<()>),
    MemoryExceeded,
}

struct InstanceRecord {
    instance: Instance,
    index: u32,
    ctrl_tx: Option<mpsc::UnboundedSender<ControlMsg>>,
    restart_cancel: Option<oneshot::Sender<()>>,
}

enum Decision {
    Remove,
    Errored,
    Restart {
        spec: ProcessSpec,
        index: u32,
        restart_count: u32,
    },
}

/// Owns every admitted spec and live Instance. Cheap to clone: state is
/// `Arc`-shared, so handing a `Supervisor` to a background task is just a
/// refcount bump.
#[derive(Clone)]
pub struct Supervisor {
    grace_period: Duration,
    base_restart_delay: Duration,
    max_restart_delay: Duration,
    memory_check_interval: Duration,
    clock: Arc<dyn Clock>,
    child_adapter: Arc<dyn ChildProcessAdapter>,
    monitor: Monitor,
    log_pipeline: LogPipeline,
    daemon_env: BTreeMap<String, String>,
    specs: Arc<Mutex<HashMap<String, ProcessSpec>>>,
    instances: Arc<Mutex<HashMap<InstanceId, InstanceRecord>>>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        child_adapter: Arc<dyn ChildProcessAdapter>,
        monitor: Monitor,
        log_pipeline: LogPipeline,
        clock: Arc<dyn Clock>,
        daemon_env: BTreeMap<String, String>,
    ) -> Self {
        let supervisor = Self {
            grace_period: config.grace_period,
            base_restart_delay: config.base_restart_delay,
            max_restart_delay: config.max_restart_delay,
            memory_check_interval: config.memory_check_interval,
            clock,
            child_adapter,
            monitor,
            log_pipeline,
            daemon_env,
            specs: Arc::new(Mutex::new(HashMap::new())),
            instances: Arc::new(Mutex::new(HashMap::new())),
        };
        supervisor.spawn_memory_watchdog();
        supervisor
    }

    /// Admit `spec` and spawn every instance it names. On any spawn failure
    /// the whole admission rolls back: already-spawned siblings are torn
    /// down and the spec is not retained.
    pub async fn start(&self, spec: ProcessSpec) -> Result<Vec<Instance>, SupervisorError> {
        {
            let mut specs = self.specs.lock();
            if specs.contains_key(&spec.id) {
                return Err(SupervisorError::DuplicateId(spec.id));
            }
            specs.insert(spec.id.clone(), spec.clone());
        }

        let mut spawned = Vec::new();
        for i in 0..spec.instances {
            match self.spawn_one(&spec, i, 0).await {
                Ok(instance) => spawned.push(instance),
                Err(e) => {
                    for instance in &spawned {
                        let _ = self.stop(&instance.instance_id).await;
                    }
                    self.specs.lock().remove(&spec.id);
                    return Err(e);
                }
            }
        }
        Ok(spawned)
    }

    /// Mark `instanceId` stopped and tear it down. Idempotent: stopping an
    /// already-terminal Instance succeeds without resignalling anything.
    pub async fn stop(&self, instance_id: &InstanceId) -> Result<(), SupervisorError> {
        let ack_rx = {
            let mut instances = self.instances.lock();
            let Some(record) = instances.get_mut(instance_id) else {
                return Err(SupervisorError::NotFound(instance_id.as_str().to_string()));
            };
            match record.instance.status {
                InstanceStatus::Stopped => None,
                InstanceStatus::Errored => {
                    instances.remove(instance_id);
                    None
                }
                InstanceStatus::Restarting => {
                    if let Some(cancel) = record.restart_cancel.take() {
                        let _ = cancel.send(());
                    }
                    instances.remove(instance_id);
                    None
                }
                InstanceStatus::Running => {
                    record.instance.status = InstanceStatus::Stopped;
                    match &record.ctrl_tx {
                        Some(tx) => {
                            let (ack_tx, ack_rx) = oneshot::channel();
                            let _ = tx.send(ControlMsg::Stop(ack_tx));
                            Some(ack_rx)
                        }
                        None => None,
                    }
                }
            }
        };

        match ack_rx {
            // The running task tears down monitor/log capture once it reaps the child.
            Some(ack_rx) => {
                let _ = ack_rx.await;
            }
            None => {
                self.monitor.stop(instance_id, true);
                self.log_pipeline.stop_capture(instance_id);
            }
        }
        Ok(())
    }

    /// Stop, then spawn a fresh Instance reusing the stored spec and the
    /// same `instanceId`, with `restartCount` reset to `0`.
    pub async fn restart(&self, instance_id: &InstanceId) -> Result<Instance, SupervisorError> {
        let (spec_id, index) = {
            let instances = self.instances.lock();
            let record = instances
                .get(instance_id)
                .ok_or_else(|| SupervisorError::NotFound(instance_id.as_str().to_string()))?;
            (record.instance.spec_id.clone(), record.index)
        };
        self.stop(instance_id).await?;
        let spec = {
            let specs = self.specs.lock();
            specs
                .get(&spec_id)
                .cloned()
                .ok_or_else(|| SupervisorError::NotFound(spec_id.clone()))?
        };
        self.spawn_one(&spec, index, 0).await
    }

    /// Resize a clustered spec to `n` instances, spawning or stopping the
    /// highest-indexed surplus as needed.
    pub async fn scale(&self, id: &str, n: u32) -> Result<Vec<Instance>, SupervisorError> {
        if n == 0 {
            return Err(SupervisorError::InvalidScale("scale target must be at least 1".to_string()));
        }
        let mut spec = {
            let specs = self.specs.lock();
            specs
                .get(id)
                .cloned()
                .ok_or_else(|| SupervisorError::NotFound(id.to_string()))?
        };

        let current: Vec<(u32, InstanceId)> = {
            let instances = self.instances.lock();
            instances
                .values()
                .filter(|r| r.instance.spec_id == id)
                .map(|r| (r.index, r.instance.instance_id.clone()))
                .collect()
        };
        let current_count = current.len() as u32;

        if n > current_count {
            for i in current_count..n {
                self.spawn_one(&spec, i, 0).await?;
            }
        } else if n < current_count {
            let mut surplus = current;
            surplus.retain(|(i, _)| *i >= n);
            surplus.sort_by_key(|(i, _)| std::cmp::Reverse(*i));
            for (_, instance_id) in surplus {
                self.stop(&instance_id).await?;
            }
        }

        spec.instances = n;
        self.specs.lock().insert(id.to_string(), spec);
        Ok(self.list_for_spec(id))
    }

    /// Stop every matching Instance, remove the spec, and request log cleanup.
    pub async fn delete(&self, id: &str) -> Result<(), SupervisorError> {
        let ids: Vec<InstanceId> = {
            let instances = self.instances.lock();
            instances
                .values()
                .filter(|r| r.instance.spec_id == id)
                .map(|r| r.instance.instance_id.clone())
                .collect()
        };
        for instance_id in &ids {
            self.stop(instance_id).await?;
            let _ = self.log_pipeline.cleanup_logs(instance_id).await;
        }
        if self.specs.lock().remove(id).is_none() {
            return Err(SupervisorError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<Instance> {
        self.instances.lock().values().map(|r| r.instance.clone()).collect()
    }

    /// The Monitor backing this Supervisor's Instances, for read-only
    /// metrics queries (`monit`/`show`). Cheap: internal state is `Arc`-shared.
    pub fn monitor(&self) -> Monitor {
        self.monitor.clone()
    }

    /// The Log Pipeline backing this Supervisor's Instances, for `logs`
    /// queries. Cheap: internal state is `Arc`-shared.
    pub fn log_pipeline(&self) -> LogPipeline {
        self.log_pipeline.clone()
    }

    pub fn spec(&self, id: &str) -> Option<ProcessSpec> {
        self.specs.lock().get(id).cloned()
    }

    pub fn specs(&self) -> Vec<ProcessSpec> {
        self.specs.lock().values().cloned().collect()
    }

    /// Resolve `identifier` to every matching `instanceId`, per §4.5: exact
    /// `instanceId`, then `instanceId` beginning with `"{identifier}_"`,
    /// then `ProcessSpec.name`.
    pub fn resolve(&self, identifier: &str) -> Vec<InstanceId> {
        let instances = self.instances.lock();
        if let Some(record) = instances.get(identifier) {
            return vec![record.instance.instance_id.clone()];
        }

        let prefix = format!("{identifier}_");
        let by_prefix: Vec<InstanceId> = instances
            .values()
            .filter(|r| r.instance.instance_id.as_str().starts_with(&prefix))
            .map(|r| r.instance.instance_id.clone())
            .collect();
        if !by_prefix.is_empty() {
            return by_prefix;
        }

        let specs = self.specs.lock();
        instances
            .values()
            .filter(|r| specs.get(&r.instance.spec_id).is_some_and(|s| s.name == identifier))
            .map(|r| r.instance.instance_id.clone())
            .collect()
    }

    fn list_for_spec(&self, id: &str) -> Vec<Instance> {
        self.instances
            .lock()
            .values()
            .filter(|r| r.instance.spec_id == id)
            .map(|r| r.instance.clone())
            .collect()
    }

    pub fn get_restart_stats(&self, instance_id: &InstanceId) -> Result<RestartStats, SupervisorError> {
        let instances = self.instances.lock();
        let record = instances
            .get(instance_id)
            .ok_or_else(|| SupervisorError::NotFound(instance_id.as_str().to_string()))?;
        let specs = self.specs.lock();
        let spec = specs
            .get(&record.instance.spec_id)
            .ok_or_else(|| SupervisorError::NotFound(record.instance.spec_id.clone()))?;
        Ok(RestartStats {
            restart_count: record.instance.restart_count,
            max_restarts: spec.max_restarts,
            can_restart: spec.autorestart && record.instance.restart_count < spec.max_restarts,
        })
    }

    async fn spawn_one(&self, spec: &ProcessSpec, index: u32, restart_count: u32) -> Result<Instance, SupervisorError> {
        let instance_id = spec.instance_id(index);
        let env = self.build_env(spec, index);
        let req = SpawnRequest {
            script: spec.script.clone(),
            cwd: spec.cwd.clone(),
            env,
        };
        let mut handle = self
            .child_adapter
            .spawn(req)
            .await
            .map_err(|e| SupervisorError::StartupFailed(e.to_string()))?;
        let pid = handle.pid();

        let mut instance = Instance::new(instance_id.clone(), spec.id.clone(), self.clock.wall_now());
        instance.pid = Some(pid);
        instance.restart_count = restart_count;

        self.log_pipeline.register(instance_id.clone());
        self.monitor.start(instance_id.clone(), pid);

        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        self.instances.lock().insert(
            instance_id.clone(),
            InstanceRecord {
                instance: instance.clone(),
                index,
                ctrl_tx: Some(ctrl_tx),
                restart_cancel: None,
            },
        );

        let supervisor = self.clone();
        let iid = instance_id.clone();
        tokio::spawn(async move {
            supervisor.run_instance(iid, handle, ctrl_rx).await;
        });

        Ok(instance)
    }

    async fn run_instance(
        &self,
        instance_id: InstanceId,
        mut handle: Box<dyn ChildHandle>,
        mut ctrl_rx: mpsc::UnboundedReceiver<ControlMsg>,
    ) {
        let mut stop_ack: Option<oneshot::Sender<()>> = None;
        let mut terminating = false;
        let mut killed = false;
        let deadline = tokio::time::Instant::now() + self.grace_period;

        loop {
            if terminating {
                tokio::select! {
                    line = handle.next_line() => match line {
                        Some((stream, message)) => self.log_pipeline.capture(&instance_id, to_core_stream(stream), message).await,
                        None => break,
                    },
                    _ = tokio::time::sleep_until(deadline), if !killed => {
                        killed = true;
                        let _ = handle.kill().await;
                    }
                }
            } else {
                tokio::select! {
                    line = handle.next_line() => match line {
                        Some((stream, message)) => self.log_pipeline.capture(&instance_id, to_core_stream(stream), message).await,
                        None => break,
                    },
                    Some(msg) = ctrl_rx.recv() => {
                        terminating = true;
                        if let ControlMsg::Stop(ack) = msg {
                            stop_ack = Some(ack);
                        }
                        let _ = handle.terminate().await;
                    }
                }
            }
        }

        let exit_status = handle.wait().await.unwrap_or(ExitStatus {
            code: Some(0),
            signaled: false,
        });

        // drain any late control messages (e.g. a memory-limit trigger that
        // lost the race with a natural exit) so the sender doesn't block.
        while ctrl_rx.try_recv().is_ok() {}

        // remove the now-dead ctrl_tx so future stop()/scale() calls treat
        // this instance as having no live task to signal.
        {
            let mut instances = self.instances.lock();
            if let Some(record) = instances.get_mut(&instance_id) {
                record.ctrl_tx = None;
            }
        }

        self.handle_exit(&instance_id, exit_status).await;
        if let Some(ack) = stop_ack {
            let _ = ack.send(());
        }
    }

    async fn handle_exit(&self, instance_id: &InstanceId, exit_status: ExitStatus) {
        let decision = {
            let mut instances = self.instances.lock();
            let Some(record) = instances.get(instance_id) else {
                return;
            };
            if record.instance.status == InstanceStatus::Stopped {
                instances.remove(instance_id);
                Decision::Remove
            } else if exit_status.is_success() {
                instances.remove(instance_id);
                Decision::Remove
            } else {
                let specs = self.specs.lock();
                let spec = specs.get(&record.instance.spec_id).cloned();
                drop(specs);
                match spec {
                    None => {
                        instances.remove(instance_id);
                        Decision::Remove
                    }
                    Some(spec) => {
                        let restart_count = record.instance.restart_count;
                        let index = record.index;
                        if !spec.autorestart || restart_count >= spec.max_restarts {
                            if let Some(r) = instances.get_mut(instance_id) {
                                r.instance.status = InstanceStatus::Errored;
                            }
                            Decision::Errored
                        } else {
                            let new_count = restart_count + 1;
                            if let Some(r) = instances.get_mut(instance_id) {
                                r.instance.status = InstanceStatus::Restarting;
                                r.instance.restart_count = new_count;
                                r.instance.pid = None;
                            }
                            Decision::Restart {
                                spec,
                                index,
                                restart_count: new_count,
                            }
                        }
                    }
                }
            }
        };

        match decision {
            Decision::Remove => {
                self.monitor.stop(instance_id, true);
                self.log_pipeline.stop_capture(instance_id);
            }
            Decision::Errored => {
                self.monitor.stop(instance_id, false);
                tracing::warn!(instance_id = %instance_id, "instance entered errored state");
            }
            Decision::Restart {
                spec,
                index,
                restart_count,
            } => {
                self.monitor.stop(instance_id, false);
                self.schedule_restart(spec, index, instance_id.clone(), restart_count);
            }
        }
    }

    fn schedule_restart(&self, spec: ProcessSpec, index: u32, instance_id: InstanceId, restart_count: u32) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut instances = self.instances.lock();
            match instances.get_mut(&instance_id) {
                Some(record) => record.restart_cancel = Some(cancel_tx),
                None => return,
            }
        }

        let supervisor = self.clone();
        let jitter_fraction = rand::random::<f64>() * 0.1;
        let delay = restart_delay(restart_count, self.base_restart_delay, self.max_restart_delay, jitter_fraction);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx => return,
                () = tokio::time::sleep(delay) => {}
            }
            {
                let mut instances = supervisor.instances.lock();
                match instances.get_mut(&instance_id) {
                    Some(record) => record.restart_cancel = None,
                    None => return,
                }
            }
            if let Err(_e) = supervisor.spawn_one(&spec, index, restart_count).await {
                supervisor.handle_restart_failure(&instance_id, &spec, index, restart_count).await;
            }
        });
    }

    async fn handle_restart_failure(&self, instance_id: &InstanceId, spec: &ProcessSpec, index: u32, restart_count: u32) {
        if restart_count >= spec.max_restarts {
            let mut instances = self.instances.lock();
            if let Some(record) = instances.get_mut(instance_id) {
                record.instance.status = InstanceStatus::Errored;
            }
            tracing::warn!(instance_id = %instance_id, "spawn failed after exhausting restarts");
        } else {
            let new_count = restart_count + 1;
            {
                let mut instances = self.instances.lock();
                if let Some(record) = instances.get_mut(instance_id) {
                    record.instance.restart_count = new_count;
                }
            }
            self.schedule_restart(spec.clone(), index, instance_id.clone(), new_count);
        }
    }

    fn spawn_memory_watchdog(&self) {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(supervisor.memory_check_interval);
            loop {
                ticker.tick().await;
                supervisor.check_memory_limits().await;
            }
        });
    }

    async fn check_memory_limits(&self) {
        let candidates: Vec<(InstanceId, u64, mpsc::UnboundedSender<ControlMsg>)> = {
            let instances = self.instances.lock();
            let specs = self.specs.lock();
            instances
                .values()
                .filter(|r| r.instance.status == InstanceStatus::Running)
                .filter_map(|r| {
                    let spec = specs.get(&r.instance.spec_id)?;
                    let limit = spec.memory_limit?;
                    let tx = r.ctrl_tx.clone()?;
                    Some((r.instance.instance_id.clone(), limit, tx))
                })
                .collect()
        };
        for (instance_id, limit, tx) in candidates {
            if self.monitor.check_memory_limit(&instance_id, limit) {
                tracing::warn!(instance_id = %instance_id, limit, "memory limit exceeded");
                let _ = tx.send(ControlMsg::MemoryExceeded);
            }
        }
    }

    fn build_env(&self, spec: &ProcessSpec, index: u32) -> BTreeMap<String, String> {
        let mut env = self.daemon_env.clone();
        env.extend(spec.env.clone());
        if spec.instances > 1 {
            let base_port: u32 = spec.env.get("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000);
            env.insert("PORT".to_string(), (base_port + index).to_string());
        }
        env
    }
}

fn to_core_stream(stream: ChildStream) -> Stream {
    match stream {
        ChildStream::Stdout => Stream::Stdout,
        ChildStream::Stderr => Stream::Stderr,
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
