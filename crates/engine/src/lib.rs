// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The process supervisor's runtime core: spawn and reap children, capture
//! and rotate their logs, and sample their resource usage.

pub mod error;
pub mod intern;
pub mod log_paths;
pub mod log_pipeline;
pub mod monitor;
pub mod ring;
pub mod supervisor;

pub use error::{LogPipelineError, MonitorError, SupervisorError};
pub use log_pipeline::LogPipeline;
pub use monitor::Monitor;
pub use ring::Ring;
pub use supervisor::{RestartStats, Supervisor, SupervisorConfig};
