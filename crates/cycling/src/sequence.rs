// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequence abstraction
//!
//! [`SequenceOps`] is the navigation interface each flavor's recurrence
//! implements; [`CycleSequence`] dispatches over the flavors at runtime.
//! Navigation over a sequence with exclusions skips excluded points
//! transparently, up to a scan limit that turns pathological exclusion
//! sets into an error instead of an unbounded loop.

use std::fmt;

use crate::error::CyclingError;
use crate::integer::IntegerSequence;
use crate::interval::CycleInterval;
use crate::iso8601::IsoSequence;
use crate::point::{CyclePoint, PointOps};

/// Bound on consecutive excluded points skipped during one navigation
/// call.
pub(crate) const EXCLUSION_SCAN_LIMIT: usize = 10_000;

/// Navigation over a recurrence of cycle points.
pub trait SequenceOps {
    type Point: PointOps;

    /// Grid membership, ignoring the window bounds.
    fn is_on_sequence(&self, point: &Self::Point) -> bool;

    /// Grid membership within the window bounds.
    fn is_valid(&self, point: &Self::Point) -> bool;

    /// The last sequence point strictly before `point`, bounds-checked.
    fn get_prev_point(&self, point: &Self::Point) -> Result<Option<Self::Point>, CyclingError>;

    /// The last sequence point at or before `point`, clamping a query past
    /// the end bound onto the grid.
    fn get_nearest_prev_point(
        &self,
        point: &Self::Point,
    ) -> Result<Option<Self::Point>, CyclingError>;

    /// The first sequence point strictly after `point`. A query before the
    /// start bound returns the first point of the sequence.
    fn get_next_point(&self, point: &Self::Point) -> Result<Option<Self::Point>, CyclingError>;

    /// One step on from a point assumed to be on the sequence.
    fn get_next_point_on_sequence(
        &self,
        point: &Self::Point,
    ) -> Result<Option<Self::Point>, CyclingError>;

    /// The first sequence point at or after `point`.
    fn get_first_point(&self, point: &Self::Point) -> Result<Option<Self::Point>, CyclingError>;

    /// The first point of the sequence.
    fn get_start_point(&self) -> Result<Option<Self::Point>, CyclingError>;

    /// The final point of the sequence, if it has one.
    fn get_stop_point(&self) -> Result<Option<Self::Point>, CyclingError>;

    /// Shift the whole sequence by an interval. Repeated calls accumulate.
    fn set_offset(
        &mut self,
        offset: &<Self::Point as PointOps>::Interval,
    ) -> Result<(), CyclingError>;
}

/// A recurrence of either flavor.
///
/// The flavor is taken from the context start point at construction;
/// navigation calls with a point of the other flavor are a
/// [`CyclingError::TypeMismatch`] (or plain `false` for the membership
/// predicates).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CycleSequence {
    Integer(IntegerSequence),
    Iso(IsoSequence),
}

macro_rules! delegate_nav {
    ($name:ident) => {
        pub fn $name(&self, point: &CyclePoint) -> Result<Option<CyclePoint>, CyclingError> {
            match (self, point) {
                (Self::Integer(sequence), CyclePoint::Integer(point)) => {
                    Ok(sequence.$name(point)?.map(CyclePoint::Integer))
                }
                (Self::Iso(sequence), CyclePoint::Iso(point)) => {
                    Ok(sequence.$name(point)?.map(CyclePoint::Iso))
                }
                _ => Err(self.mismatch(point)),
            }
        }
    };
}

impl CycleSequence {
    /// Build a sequence of the same flavor as the context start point.
    pub fn new(
        expr: &str,
        context_start: &CyclePoint,
        context_stop: Option<&CyclePoint>,
    ) -> Result<Self, CyclingError> {
        match context_start {
            CyclePoint::Integer(start) => {
                let stop = match context_stop {
                    Some(CyclePoint::Integer(stop)) => Some(*stop),
                    Some(other) => return Err(mismatch_labels(context_start, other)),
                    None => None,
                };
                IntegerSequence::new(expr, *start, stop).map(Self::Integer)
            }
            CyclePoint::Iso(start) => {
                let stop = match context_stop {
                    Some(CyclePoint::Iso(stop)) => Some(stop),
                    Some(other) => return Err(mismatch_labels(context_start, other)),
                    None => None,
                };
                IsoSequence::new(expr, start, stop).map(Self::Iso)
            }
        }
    }

    /// Express a one-off recurrence at the given point, or at the context
    /// start when no point is given.
    pub fn get_async_expr(point: Option<&CyclePoint>) -> String {
        match point {
            Some(point) => format!("R1/{point}"),
            None => "R1".to_string(),
        }
    }

    pub fn is_on_sequence(&self, point: &CyclePoint) -> bool {
        match (self, point) {
            (Self::Integer(sequence), CyclePoint::Integer(point)) => {
                sequence.is_on_sequence(point)
            }
            (Self::Iso(sequence), CyclePoint::Iso(point)) => sequence.is_on_sequence(point),
            _ => false,
        }
    }

    pub fn is_valid(&self, point: &CyclePoint) -> bool {
        match (self, point) {
            (Self::Integer(sequence), CyclePoint::Integer(point)) => sequence.is_valid(point),
            (Self::Iso(sequence), CyclePoint::Iso(point)) => sequence.is_valid(point),
            _ => false,
        }
    }

    delegate_nav!(get_prev_point);
    delegate_nav!(get_nearest_prev_point);
    delegate_nav!(get_next_point);
    delegate_nav!(get_next_point_on_sequence);
    delegate_nav!(get_first_point);

    pub fn get_start_point(&self) -> Result<Option<CyclePoint>, CyclingError> {
        match self {
            Self::Integer(sequence) => Ok(sequence.get_start_point()?.map(CyclePoint::Integer)),
            Self::Iso(sequence) => Ok(sequence.get_start_point()?.map(CyclePoint::Iso)),
        }
    }

    pub fn get_stop_point(&self) -> Result<Option<CyclePoint>, CyclingError> {
        match self {
            Self::Integer(sequence) => Ok(sequence.get_stop_point()?.map(CyclePoint::Integer)),
            Self::Iso(sequence) => Ok(sequence.get_stop_point()?.map(CyclePoint::Iso)),
        }
    }

    pub fn set_offset(&mut self, offset: &CycleInterval) -> Result<(), CyclingError> {
        let label = self.type_label();
        match (&mut *self, offset) {
            (Self::Integer(sequence), CycleInterval::Integer(offset)) => {
                sequence.set_offset(offset)
            }
            (Self::Iso(sequence), CycleInterval::Iso(offset)) => sequence.set_offset(offset),
            (_, offset) => Err(CyclingError::TypeMismatch {
                left: label,
                right: offset.type_label(),
            }),
        }
    }

    pub fn step(&self) -> Option<CycleInterval> {
        match self {
            Self::Integer(sequence) => sequence.step().map(CycleInterval::Integer),
            Self::Iso(sequence) => sequence.step().map(CycleInterval::Iso),
        }
    }

    /// Flavor label, matching the point type the sequence navigates.
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Integer(_) => crate::integer::IntegerPoint::type_label(),
            Self::Iso(_) => crate::iso8601::IsoPoint::type_label(),
        }
    }

    fn mismatch(&self, point: &CyclePoint) -> CyclingError {
        CyclingError::TypeMismatch {
            left: self.type_label(),
            right: point.type_label(),
        }
    }
}

fn mismatch_labels(left: &CyclePoint, right: &CyclePoint) -> CyclingError {
    CyclingError::TypeMismatch {
        left: left.type_label(),
        right: right.type_label(),
    }
}

impl fmt::Display for CycleSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(sequence) => sequence.fmt(f),
            Self::Iso(sequence) => sequence.fmt(f),
        }
    }
}

impl From<IntegerSequence> for CycleSequence {
    fn from(sequence: IntegerSequence) -> Self {
        Self::Integer(sequence)
    }
}

impl From<IsoSequence> for CycleSequence {
    fn from(sequence: IsoSequence) -> Self {
        Self::Iso(sequence)
    }
}

#[cfg(test)]
#[path = "sequence_tests.rs"]
mod tests;
