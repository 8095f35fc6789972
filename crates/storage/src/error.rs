// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors for the on-disk artifacts the State Manager maintains, convertible
//! into the shared [`PmdError`] taxonomy at the crate boundary.

use pmd_core::{ErrorCode, PmdError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed json at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("another daemon already holds the lock at {0}")]
    AlreadyLocked(String),
    #[error("malformed memory limit {0:?}")]
    BadMemoryLimit(String),
}

impl From<StorageError> for PmdError {
    fn from(e: StorageError) -> Self {
        match &e {
            StorageError::Io(_) => PmdError::new(ErrorCode::FileNotFound, e.to_string()),
            StorageError::Json { path, .. } => {
                PmdError::new(ErrorCode::ConfigFileNotFound, e.to_string()).with_context("path", path)
            }
            StorageError::AlreadyLocked(path) => {
                PmdError::new(ErrorCode::ProcessStartupFailed, e.to_string()).with_context("path", path)
            }
            StorageError::BadMemoryLimit(raw) => {
                PmdError::new(ErrorCode::InvalidConfiguration, e.to_string()).with_context("memoryLimit", raw)
            }
        }
    }
}
