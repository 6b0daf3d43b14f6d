// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gyre-engine: scheduler-side job orchestration for the Gyre scheduler
//!
//! The engine prepares job scripts, dispatches submit/poll/kill batches
//! through a bounded subprocess pool, and translates batch output back into
//! task lifecycle events. Host selection, remote provisioning, and poll
//! scheduling all live here; the job-host side is `gyre-runner`.

mod broadcast;
mod db;
mod events;
mod hosts;
pub mod jobfile;
mod manager;
mod pool;
mod remote;
mod taskpool;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use broadcast::{BroadcastLookup, Broadcasts};
pub use db::{JobDatabase, JobRow, JobUpdate, MemJobDatabase};
pub use events::{RecordedEvent, StateTaskEvents, TaskEvents};
pub use hosts::HostSelector;
pub use manager::{TaskJobDeps, TaskJobManager};
pub use pool::{CommandOutcome, CommandPool, CommandRequest, SubprocessPool, POOL_COMMAND_TIMEOUT};
pub use remote::{ssh_argv, RemoteMgr, RemotePhase, RemoteState};
pub use taskpool::TaskPool;
