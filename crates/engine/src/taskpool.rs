// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler's window of live task instances.
//!
//! Batch callbacks never hold task references across the dispatch gap; they
//! carry job keys and look the task up again here when the outcome lands.
//! A task removed (or replaced) in the meantime simply fails the lookup and
//! the late outcome is dropped with a log line.

use gyre_core::TaskProxy;
use indexmap::IndexMap;

/// Live task instances, keyed by `point/name` relative id.
#[derive(Debug, Default)]
pub struct TaskPool {
    tasks: IndexMap<String, TaskProxy>,
}

impl TaskPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, replacing any existing instance with the same id.
    pub fn insert(&mut self, task: TaskProxy) {
        self.tasks.insert(task.relative_id(), task);
    }

    pub fn get(&self, relative_id: &str) -> Option<&TaskProxy> {
        self.tasks.get(relative_id)
    }

    pub fn get_mut(&mut self, relative_id: &str) -> Option<&mut TaskProxy> {
        self.tasks.get_mut(relative_id)
    }

    pub fn remove(&mut self, relative_id: &str) -> Option<TaskProxy> {
        self.tasks.shift_remove(relative_id)
    }

    /// Relative ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskProxy> {
        self.tasks.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TaskProxy> {
        self.tasks.values_mut()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
#[path = "taskpool_tests.rs"]
mod tests;
