// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task-events seam: observed job events drive task state.
//!
//! Poll results can skip over transitions the scheduler never witnessed
//! directly (a fast job is first seen already succeeded), so applying an
//! event may step the task through the intermediate states to keep the
//! state machine's forward-only edges honest.

use std::sync::Arc;

use gyre_core::{TaskEvent, TaskProxy, TaskState};
use parking_lot::Mutex;

/// Consumes observed job events and advances task state.
pub trait TaskEvents: Send + Sync {
    /// Apply one event to a task. `time` is the event's own timestamp when
    /// the source recorded one, else the processing time.
    fn process(&self, task: &mut TaskProxy, event: TaskEvent, time: &str);
}

/// One event as it was applied, for the scheduler's event log.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub relative_id: String,
    pub submit_num: u32,
    pub event: TaskEvent,
    pub time: String,
}

/// Standard [`TaskEvents`] implementation: applies the transition and keeps
/// an ordered record of everything observed. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct StateTaskEvents {
    log: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl StateTaskEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in arrival order.
    pub fn recorded(&self) -> Vec<RecordedEvent> {
        self.log.lock().clone()
    }

    /// Recorded events for one task instance.
    pub fn recorded_for(&self, relative_id: &str) -> Vec<RecordedEvent> {
        self.log
            .lock()
            .iter()
            .filter(|record| record.relative_id == relative_id)
            .cloned()
            .collect()
    }
}

impl TaskEvents for StateTaskEvents {
    fn process(&self, task: &mut TaskProxy, event: TaskEvent, time: &str) {
        let before = task.state;
        match &event {
            TaskEvent::Submitted => {
                task.advance(TaskState::Submitted);
            }
            TaskEvent::Started => {
                advance_through(task, TaskState::Running);
            }
            TaskEvent::Succeeded => {
                advance_through(task, TaskState::Succeeded);
            }
            TaskEvent::Failed { .. } => {
                advance_through(task, TaskState::Failed);
            }
            TaskEvent::SubmitFailed => {
                task.advance(TaskState::SubmitFailed);
            }
            TaskEvent::Message { .. } => {}
        }
        if task.state != before {
            tracing::info!(
                task = %task.relative_id(),
                submit_num = task.submit_num,
                from = %before,
                to = %task.state,
                event = %event,
                "task state changed"
            );
        } else {
            tracing::debug!(
                task = %task.relative_id(),
                submit_num = task.submit_num,
                event = %event,
                "task event"
            );
        }
        self.log.lock().push(RecordedEvent {
            relative_id: task.relative_id(),
            submit_num: task.submit_num,
            event,
            time: time.to_string(),
        });
    }
}

/// Advance toward `target`, taking any legal intermediate edges first.
///
/// Illegal requests (already final, or the task never left waiting) leave
/// the state untouched; `TaskProxy::advance` guards each edge.
fn advance_through(task: &mut TaskProxy, target: TaskState) {
    let through: &[TaskState] = match target {
        TaskState::Succeeded | TaskState::Failed => &[TaskState::Submitted, TaskState::Running],
        TaskState::Running => &[TaskState::Submitted],
        _ => &[],
    };
    for step in through {
        if task.state == target {
            return;
        }
        task.advance(*step);
    }
    task.advance(target);
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
