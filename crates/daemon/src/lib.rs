// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process supervisor daemon: the control plane, its command handlers,
//! the error taxonomy's runtime half, and daemon lifecycle sequencing. The
//! client half is also exposed here for `pmd-cli` to consume directly.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod listener;
pub mod pool;
pub mod protocol;
pub mod state;

pub use client::Client;
pub use state::AppState;
