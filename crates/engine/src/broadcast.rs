// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime broadcast overrides, applied at job-preparation time.
//!
//! A broadcast targets one task instance (`point/name`) and overlays partial
//! runtime settings on top of the task's configured runtime. Overrides only
//! affect submissions prepared after the broadcast lands; jobs already
//! dispatched keep the runtime they were prepared with.

use std::sync::Arc;

use gyre_core::RuntimeOverrides;
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Read seam the job-preparation step uses to pick up active overrides.
pub trait BroadcastLookup: Send + Sync {
    /// Overrides for one task instance, when any are active.
    fn overrides_for(&self, point: &str, name: &str) -> Option<RuntimeOverrides>;
}

/// In-memory broadcast store keyed by task instance. Clones share the same
/// store.
#[derive(Debug, Clone, Default)]
pub struct Broadcasts {
    active: Arc<Mutex<IndexMap<(String, String), RuntimeOverrides>>>,
}

impl Broadcasts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the overrides for a task instance.
    pub fn put(&self, point: &str, name: &str, overrides: RuntimeOverrides) {
        self.active
            .lock()
            .insert((point.to_string(), name.to_string()), overrides);
    }

    /// Clear the overrides for a task instance.
    pub fn clear(&self, point: &str, name: &str) {
        self.active
            .lock()
            .shift_remove(&(point.to_string(), name.to_string()));
    }
}

impl BroadcastLookup for Broadcasts {
    fn overrides_for(&self, point: &str, name: &str) -> Option<RuntimeOverrides> {
        self.active
            .lock()
            .get(&(point.to_string(), name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
