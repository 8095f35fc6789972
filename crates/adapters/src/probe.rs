// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform probe for per-pid CPU percent and resident set size, consumed
//! by the Monitor. The spec requires this not depend on any particular
//! system utility; the real implementation reads `/proc` directly on
//! Linux and reports a zero sample elsewhere.

use async_trait::async_trait;

/// One resource reading for a pid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub rss_bytes: u64,
}

/// System-wide memory/CPU info for `monit`'s `systemInfo` field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemInfo {
    pub total_memory: u64,
    pub free_memory: u64,
    pub cpu_count: u32,
}

#[async_trait]
pub trait ResourceProbe: Send + Sync {
    /// Sample CPU/RSS for `pid`. A probe failure is reported as `None`; the
    /// Monitor turns that into a zero sample per §4.3, it is never an error
    /// that propagates to the caller.
    async fn sample(&self, pid: u32) -> Option<ResourceSample>;

    async fn system_info(&self) -> SystemInfo;
}

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(not(target_os = "linux"))]
pub mod other;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeResourceProbe;
#[cfg(target_os = "linux")]
pub use linux::LinuxResourceProbe;
#[cfg(target_os = "linux")]
pub type SystemResourceProbe = LinuxResourceProbe;
#[cfg(not(target_os = "linux"))]
pub use other::UnsupportedResourceProbe;
#[cfg(not(target_os = "linux"))]
pub type SystemResourceProbe = UnsupportedResourceProbe;

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
