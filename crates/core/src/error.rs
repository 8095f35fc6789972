// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared error taxonomy: one tagged struct carrying category, a stable
//! code, severity, structured context, and whether the failure is locally
//! recoverable. Every fallible operation in this crate family eventually
//! produces (or converts into) a [`PmdError`]; component-local `thiserror`
//! enums convert into it at the crate boundary rather than the reverse, so
//! the taxonomy never grows an inheritance hierarchy of its own.

use std::collections::BTreeMap;
use std::fmt;

/// High-level classification of where a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Process,
    Config,
    Ipc,
    Filesystem,
    Validation,
    Resource,
    Network,
    System,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Process => "process",
            ErrorCategory::Config => "config",
            ErrorCategory::Ipc => "ipc",
            ErrorCategory::Filesystem => "filesystem",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Network => "network",
            ErrorCategory::System => "system",
        };
        f.write_str(s)
    }
}

/// How urgently an error deserves attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Stable error codes from the §7 taxonomy. The `Display` impl is the stable
/// wire/log string; never renumber or rename a variant once it ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    ProcessStartupFailed,
    ProcessCrashed,
    ProcessRestartLimitExceeded,
    ProcessMemoryLimitExceeded,
    InvalidConfiguration,
    ConfigFileNotFound,
    IpcConnectionFailed,
    IpcTimeout,
    FileNotFound,
    PermissionDenied,
    ResourceExhausted,
    UnknownError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ProcessStartupFailed => "PROCESS_STARTUP_FAILED",
            ErrorCode::ProcessCrashed => "PROCESS_CRASHED",
            ErrorCode::ProcessRestartLimitExceeded => "PROCESS_RESTART_LIMIT_EXCEEDED",
            ErrorCode::ProcessMemoryLimitExceeded => "PROCESS_MEMORY_LIMIT_EXCEEDED",
            ErrorCode::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorCode::ConfigFileNotFound => "CONFIG_FILE_NOT_FOUND",
            ErrorCode::IpcConnectionFailed => "IPC_CONNECTION_FAILED",
            ErrorCode::IpcTimeout => "IPC_TIMEOUT",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Category each code belongs to, per §7.
    pub const fn category(self) -> ErrorCategory {
        match self {
            ErrorCode::ProcessStartupFailed
            | ErrorCode::ProcessCrashed
            | ErrorCode::ProcessRestartLimitExceeded
            | ErrorCode::ProcessMemoryLimitExceeded => ErrorCategory::Process,
            ErrorCode::InvalidConfiguration | ErrorCode::ConfigFileNotFound => ErrorCategory::Config,
            ErrorCode::IpcConnectionFailed | ErrorCode::IpcTimeout => ErrorCategory::Ipc,
            ErrorCode::FileNotFound | ErrorCode::PermissionDenied => ErrorCategory::Filesystem,
            ErrorCode::ResourceExhausted => ErrorCategory::Resource,
            ErrorCode::UnknownError => ErrorCategory::System,
        }
    }

    /// Whether this kind of failure is recoverable in principle, per §7.
    /// `PROCESS_RESTART_LIMIT_EXCEEDED` and `PROCESS_MEMORY_LIMIT_EXCEEDED`
    /// are explicitly carved out of the otherwise-recoverable process family.
    pub const fn recoverable(self) -> bool {
        matches!(
            self,
            ErrorCode::ProcessStartupFailed
                | ErrorCode::ProcessCrashed
                | ErrorCode::IpcConnectionFailed
                | ErrorCode::IpcTimeout
        )
    }

    /// Default severity for a code absent a more specific override.
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            ErrorCode::ResourceExhausted => ErrorSeverity::Critical,
            ErrorCode::ProcessRestartLimitExceeded | ErrorCode::ProcessMemoryLimitExceeded => {
                ErrorSeverity::Error
            }
            ErrorCode::ProcessCrashed | ErrorCode::IpcConnectionFailed | ErrorCode::IpcTimeout => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, contextualized error flowing through the daemon.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PmdError {
    pub code: ErrorCode,
    pub severity: ErrorSeverity,
    pub context: BTreeMap<String, String>,
    message: String,
}

impl PmdError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            context: BTreeMap::new(),
            message: message.into(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn recoverable(&self) -> bool {
        self.code.recoverable()
    }

    /// The raw detail message, distinct from [`Self::user_message`].
    pub fn detail(&self) -> &str {
        &self.message
    }

    /// Render a user-facing message composed from the code's template and
    /// the structured context, per §7's propagation policy.
    pub fn user_message(&self) -> String {
        if self.context.is_empty() {
            format!("{}: {}", self.code, self.message)
        } else {
            let ctx: Vec<String> = self
                .context
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            format!("{}: {} ({})", self.code, self.message, ctx.join(", "))
        }
    }
}

impl fmt::Display for PmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for PmdError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
