// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gyre-core: shared task, job, and protocol types for the Gyre scheduler

pub mod clock;
pub mod event;
pub mod job;
pub mod platform;
pub mod protocol;
pub mod task;
pub mod timer;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{format_time, Clock, FakeClock, SystemClock};
pub use event::{Severity, TaskEvent, UnknownSeverity};
pub use job::{JobKeyError, TaskJobKey, NN};
pub use platform::{PlatformConfig, PlatformGroup, Platforms};
pub use protocol::{BatchLine, JobPollContext, ProtocolError, SummaryLine};
pub use task::{RuntimeConfig, RuntimeOverrides, TaskProxy, TaskState};
pub use timer::ActionTimer;
