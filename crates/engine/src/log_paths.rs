// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path conventions for the Log Pipeline: `{logRoot}/{instanceId}/out.log`
//! and `error.log`, with rotation suffixes `.1 … .10`.

use std::path::{Path, PathBuf};

use pmd_core::{InstanceId, Stream};

pub fn instance_dir(log_root: &Path, instance_id: &InstanceId) -> PathBuf {
    log_root.join(instance_id.as_str())
}

pub fn stream_log_path(log_root: &Path, instance_id: &InstanceId, stream: Stream) -> PathBuf {
    instance_dir(log_root, instance_id).join(stream_file_name(stream))
}

fn stream_file_name(stream: Stream) -> &'static str {
    match stream {
        Stream::Stdout => "out.log",
        Stream::Stderr => "error.log",
    }
}

pub fn rotated_path(base: &Path, n: u32) -> PathBuf {
    let mut os = base.as_os_str().to_owned();
    os.push(format!(".{n}"));
    PathBuf::from(os)
}

#[cfg(test)]
#[path = "log_paths_tests.rs"]
mod tests;
