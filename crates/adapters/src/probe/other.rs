// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fallback probe for non-Linux targets: every sample fails, which the
//! Monitor turns into a zero sample per §4.3. Documented divergence per the
//! Design Notes' non-POSIX caveat — no platform-native probe is wired up
//! here yet.

use async_trait::async_trait;

use super::{ResourceProbe, ResourceSample, SystemInfo};

#[derive(Default)]
pub struct UnsupportedResourceProbe;

#[async_trait]
impl ResourceProbe for UnsupportedResourceProbe {
    async fn sample(&self, _pid: u32) -> Option<ResourceSample> {
        None
    }

    async fn system_info(&self) -> SystemInfo {
        SystemInfo {
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            ..SystemInfo::default()
        }
    }
}
