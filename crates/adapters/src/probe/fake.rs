// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ResourceProbe, ResourceSample, SystemInfo};

/// Test double: samples are whatever the test pre-loaded via [`Self::set`];
/// an unset pid probes as a failure (`None`), matching a dead/unreachable
/// child.
#[derive(Default)]
pub struct FakeResourceProbe {
    samples: Mutex<HashMap<u32, ResourceSample>>,
    system_info: Mutex<SystemInfo>,
}

impl FakeResourceProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, pid: u32, sample: ResourceSample) {
        self.samples.lock().insert(pid, sample);
    }

    pub fn set_system_info(&self, info: SystemInfo) {
        *self.system_info.lock() = info;
    }
}

#[async_trait]
impl ResourceProbe for FakeResourceProbe {
    async fn sample(&self, pid: u32) -> Option<ResourceSample> {
        self.samples.lock().get(&pid).copied()
    }

    async fn system_info(&self) -> SystemInfo {
        *self.system_info.lock()
    }
}
