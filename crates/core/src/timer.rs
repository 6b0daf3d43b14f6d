// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delay-schedule timer for task polling and retry backoff.
//!
//! An [`ActionTimer`] walks a configured list of delays (seconds): each call
//! to [`ActionTimer::next`] arms a deadline one delay further down the list.
//! Polling schedules repeat their final delay forever; retry schedules stop
//! when the list is exhausted.

use chrono::{DateTime, Duration, Utc};

/// Walks a delay list, arming one wall-clock deadline at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTimer {
    delays: Vec<f64>,
    index: usize,
    timeout: Option<DateTime<Utc>>,
}

impl ActionTimer {
    /// Create an unarmed timer over `delays` (seconds, in order).
    pub fn new(delays: Vec<f64>) -> Self {
        Self {
            delays,
            index: 0,
            timeout: None,
        }
    }

    pub fn delays(&self) -> &[f64] {
        &self.delays
    }

    /// The currently-armed deadline, if any.
    pub fn timeout(&self) -> Option<DateTime<Utc>> {
        self.timeout
    }

    /// Arm the next deadline relative to `now` and return it.
    ///
    /// When the delay list is exhausted: with `no_exhaust` the final delay
    /// repeats indefinitely; otherwise the timer disarms and returns `None`.
    pub fn next(&mut self, now: DateTime<Utc>, no_exhaust: bool) -> Option<DateTime<Utc>> {
        let delay = match self.delays.get(self.index) {
            Some(delay) => Some(*delay),
            None if no_exhaust => self.delays.last().copied(),
            None => None,
        };
        let Some(delay) = delay else {
            self.timeout = None;
            return None;
        };
        if self.index < self.delays.len() {
            self.index += 1;
        }
        let due = now + Duration::milliseconds((delay * 1000.0).round() as i64);
        self.timeout = Some(due);
        self.timeout
    }

    /// True once the armed deadline has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.timeout.is_some_and(|timeout| now >= timeout)
    }

    /// True when every delay in the list has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.index >= self.delays.len()
    }

    /// Disarm without resetting position in the delay list.
    pub fn stop(&mut self) {
        self.timeout = None;
    }

    /// Return to the top of the delay list, disarmed.
    pub fn reset(&mut self) {
        self.index = 0;
        self.timeout = None;
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
