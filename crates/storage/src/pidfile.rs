// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The PID file (`daemon.pid`): an `fs2` exclusive lock doubling as the
//! daemon's singleton guard, holding a [`DiscoveryRecord`] as its contents.

use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use pmd_core::DiscoveryRecord;
use tracing::warn;

use crate::error::StorageError;

/// An acquired exclusive lock on the PID file. Dropping it releases the OS
/// lock but does not remove the file; call [`PidLock::release`] for that.
pub struct PidLock {
    file: File,
    path: PathBuf,
}

impl PidLock {
    /// Acquire the lock and write `record` to the PID file. Fails with
    /// [`StorageError::AlreadyLocked`] if another daemon already holds it —
    /// the existing file's contents are left untouched in that case.
    pub fn acquire(path: &Path, record: &DiscoveryRecord) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Open without truncating: truncating before the lock is held would
        // wipe the running daemon's PID out from under it.
        let file = OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
        file.try_lock_exclusive().map_err(|_| {
            warn!(path = %path.display(), "daemon lock already held, refusing to start");
            StorageError::AlreadyLocked(path.display().to_string())
        })?;

        file.set_len(0)?;
        {
            let mut writer = BufWriter::new(&file);
            serde_json::to_writer_pretty(&mut writer, record).map_err(|source| StorageError::Json {
                path: path.display().to_string(),
                source,
            })?;
        }
        file.sync_all()?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Release the lock and remove the PID file, for a clean stop.
    pub fn release(self) -> Result<(), StorageError> {
        let path = self.path.clone();
        drop(self);
        crate::atomic::remove_if_present(&path)
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Read the PID file's contents without taking the lock, for health checks
/// and diagnostics from a process that isn't the daemon itself.
pub fn read(path: &Path) -> Result<Option<DiscoveryRecord>, StorageError> {
    crate::atomic::read_json(path)
}

/// Whether a PID names a process currently alive on this host, probed with
/// a no-op signal (never raised destructively).
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
