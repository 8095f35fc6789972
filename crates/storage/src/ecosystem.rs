// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ecosystem file: the human-facing `save`/`load`/`startFromFile`
//! format. Plain JSON — no DSL, no comments, no interpolation — with one
//! quality-of-life accommodation the wire protocol doesn't need: decimal
//! unit suffixes (`"512M"`) on `memoryLimit`, and `script`/`cwd` resolved
//! relative to the file's own directory rather than the daemon's cwd.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pmd_core::ProcessSpec;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StorageError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EcosystemAppDisk {
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

/// `memoryLimit` accepts either a plain byte count or a decimal-unit string
/// like `"512M"` (§6).
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

impl EcosystemAppDisk {
    fn from_spec(spec: &ProcessSpec) -> Self {
        Self {
            id: spec.id.clone(),
            name: spec.name.clone(),
            script: spec.script.clone(),
            cwd: spec.cwd.clone(),
            env: spec.env.clone(),
            instances: spec.instances,
            autorestart: spec.autorestart,
            max_restarts: spec.max_restarts,
            memory_limit: spec.memory_limit,
        }
    }

    /// Resolve `script`/`cwd` against `base` if they're relative, per §6.
    fn into_spec(self, base: &Path) -> ProcessSpec {
        let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        ProcessSpec {
            id: self.id,
            name: self.name,
            script: resolve(self.script),
            cwd: resolve(self.cwd),
            env: self.env,
            instances: self.instances,
            autorestart: self.autorestart,
            max_restarts: self.max_restarts,
            memory_limit: self.memory_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EcosystemFileDisk {
    apps: Vec<EcosystemAppDisk>,
    version: String,
    created: DateTime<Utc>,
}

const ECOSYSTEM_VERSION: &str = "1.0.0";

/// Write the ecosystem file, wrapping the current fleet with a version and
/// creation timestamp.
pub fn save(path: &Path, apps: &[ProcessSpec]) -> Result<(), StorageError> {
    let disk = EcosystemFileDisk {
        apps: apps.iter().map(EcosystemAppDisk::from_spec).collect(),
        version: ECOSYSTEM_VERSION.to_string(),
        created: Utc::now(),
    };
    crate::atomic::write_json(path, &disk)
}

/// Load the ecosystem file, resolving relative `script`/`cwd` against the
/// file's own directory.
pub fn load(path: &Path) -> Result<Vec<ProcessSpec>, StorageError> {
    let disk: EcosystemFileDisk = crate::atomic::read_json(path)?.ok_or_else(|| {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            path.display().to_string(),
        ))
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(disk.apps.into_iter().map(|a| a.into_spec(base)).collect())
}

#[cfg(test)]
#[path = "ecosystem_tests.rs"]
mod tests;
