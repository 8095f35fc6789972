// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Component-local error enums, each convertible into the shared
//! [`PmdError`] taxonomy at the crate boundary.

use pmd_core::{ErrorCode, PmdError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("spec {0} is already admitted")]
    DuplicateId(String),
    #[error("instance {0} not found")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    StartupFailed(String),
    #[error("invalid scale target: {0}")]
    InvalidScale(String),
}

impl From<SupervisorError> for PmdError {
    fn from(e: SupervisorError) -> Self {
        match &e {
            SupervisorError::DuplicateId(id) => {
                PmdError::new(ErrorCode::InvalidConfiguration, e.to_string()).with_context("id", id)
            }
            SupervisorError::NotFound(id) => {
                PmdError::new(ErrorCode::FileNotFound, e.to_string()).with_context("instanceId", id)
            }
            SupervisorError::StartupFailed(_) => PmdError::new(ErrorCode::ProcessStartupFailed, e.to_string()),
            SupervisorError::InvalidScale(_) => PmdError::new(ErrorCode::InvalidConfiguration, e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum LogPipelineError {
    #[error("instance {0} not found")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LogPipelineError> for PmdError {
    fn from(e: LogPipelineError) -> Self {
        match &e {
            LogPipelineError::NotFound(id) => {
                PmdError::new(ErrorCode::FileNotFound, e.to_string()).with_context("instanceId", id)
            }
            LogPipelineError::Io(_) => PmdError::new(ErrorCode::FileNotFound, e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("instance {0} not found")]
    NotFound(String),
}

impl From<MonitorError> for PmdError {
    fn from(e: MonitorError) -> Self {
        match &e {
            MonitorError::NotFound(id) => {
                PmdError::new(ErrorCode::FileNotFound, e.to_string()).with_context("instanceId", id)
            }
        }
    }
}
