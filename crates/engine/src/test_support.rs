// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::pool::{CommandPool, CommandRequest};

/// A [`CommandPool`] that records requests instead of running them.
///
/// Tests drain the recorded requests, decide (or actually compute) each
/// command's output, and feed the resulting outcomes back through the
/// manager's outcome handler. Clones share the same request queue.
#[derive(Debug, Clone, Default)]
pub struct FakePool {
    requests: Arc<Mutex<Vec<CommandRequest>>>,
}

impl FakePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything enqueued so far.
    pub fn take_requests(&self) -> Vec<CommandRequest> {
        std::mem::take(&mut *self.requests.lock())
    }

    /// Peek without draining.
    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

impl CommandPool for FakePool {
    fn enqueue(&self, request: CommandRequest) {
        self.requests.lock().push(request);
    }
}
