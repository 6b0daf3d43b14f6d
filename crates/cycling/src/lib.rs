// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Cycling for workflows: points, intervals and recurring sequences.
//!
//! A workflow repeats its task graph over a cycling axis. The axis comes
//! in two flavors: plain integers, and ISO 8601 date-times. Both expose
//! the same interface (parse a recurrence expression against a context
//! window, then navigate it point by point), so the scheduling layer
//! never needs to know which flavor a workflow uses.
//!
//! Flavor-generic code holds [`CyclePoint`], [`CycleInterval`] and
//! [`CycleSequence`]; code that knows its flavor can use the concrete
//! types directly. Points of different flavors never mix: comparing them
//! yields no ordering and arithmetic across flavors is an error.

mod cache;
pub mod config;
pub mod error;
pub mod integer;
pub mod interval;
pub mod iso8601;
mod isotime;
pub mod parse;
pub mod point;
mod resolve;
pub mod sequence;

pub use config::{IsoConfig, TimeZoneOffset};
pub use error::CyclingError;
pub use integer::{IntegerInterval, IntegerPoint, IntegerSequence, INTEGER_TYPE};
pub use interval::{CycleInterval, IntervalOps};
pub use iso8601::{IsoInterval, IsoPoint, IsoSequence};
pub use isotime::ISO_TYPE;
pub use point::{CyclePoint, PointOps};
pub use sequence::{CycleSequence, SequenceOps};
