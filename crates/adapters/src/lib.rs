// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the two system-facing effects the engine needs: spawning
//! and signalling a child process, and sampling its resource usage.

pub mod child;
pub mod probe;

pub use probe::{ResourceProbe, ResourceSample, SystemInfo, SystemResourceProbe};

#[cfg(unix)]
pub use child::{ChildError, ChildHandle, ChildProcessAdapter, ChildStream, ExitStatus, RealChildAdapter, SpawnRequest};
#[cfg(not(unix))]
pub use child::{ChildError, ChildHandle, ChildProcessAdapter, ChildStream, ExitStatus, SpawnRequest};

#[cfg(any(test, feature = "test-support"))]
pub use child::{FakeChildAdapter, FakeChildEvent};
#[cfg(any(test, feature = "test-support"))]
pub use probe::FakeResourceProbe;
