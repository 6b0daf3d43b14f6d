// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gyre-runner: the job-host side of the Gyre scheduler
//!
//! Takes batches of prepared job log dirs and submits, polls or kills the
//! jobs in them, printing one framed record per job for the scheduler to
//! read back.

mod background;
mod handler;
mod manager;
mod pbs;
mod registry;
mod slurm;
mod statusfile;

pub use background::BackgroundHandler;
pub use handler::{CommandResult, JobRunnerHandler, RunnerError, SubmitContext};
pub use manager::{JobRunnerManager, SubmitSource};
pub use pbs::PbsHandler;
pub use registry::JobRunnerRegistry;
pub use slurm::SlurmHandler;
