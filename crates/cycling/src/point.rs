// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle point abstraction
//!
//! [`PointOps`] is the interface each cycling flavor implements for its
//! point type; [`CyclePoint`] is the tagged union the rest of the system
//! holds when the flavor is only known at runtime. Points of different
//! flavors never compare equal and have no defined ordering; arithmetic
//! across flavors is a [`CyclingError::TypeMismatch`].

use std::fmt;
use std::hash::Hash;

use crate::config::IsoConfig;
use crate::error::CyclingError;
use crate::integer::IntegerPoint;
use crate::interval::{CycleInterval, IntervalOps};
use crate::iso8601::IsoPoint;

/// Operations every cycle point type provides.
pub trait PointOps: Clone + fmt::Display + Eq + Ord + Hash + Sized {
    type Interval: IntervalOps;

    /// Flavor label used in error messages and sort keys.
    fn type_label() -> &'static str;

    /// Reformat to the canonical rendering of the same point.
    fn standardise(self) -> Self;

    fn add(&self, interval: &Self::Interval) -> Result<Self, CyclingError>;

    fn sub_interval(&self, interval: &Self::Interval) -> Result<Self, CyclingError>;

    /// The interval from `other` up to `self`.
    fn diff(&self, other: &Self) -> Self::Interval;
}

/// A cycle point of either flavor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CyclePoint {
    Integer(IntegerPoint),
    Iso(IsoPoint),
}

impl CyclePoint {
    pub fn parse_integer(expr: &str) -> Result<Self, CyclingError> {
        IntegerPoint::parse(expr).map(Self::Integer)
    }

    pub fn parse_iso(expr: &str, config: &IsoConfig) -> Result<Self, CyclingError> {
        IsoPoint::parse(expr, config).map(Self::Iso)
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Integer(_) => IntegerPoint::type_label(),
            Self::Iso(_) => IsoPoint::type_label(),
        }
    }

    pub fn standardise(self) -> Self {
        match self {
            Self::Integer(point) => Self::Integer(point.standardise()),
            Self::Iso(point) => Self::Iso(point.standardise()),
        }
    }

    pub fn add(&self, interval: &CycleInterval) -> Result<Self, CyclingError> {
        match (self, interval) {
            (Self::Integer(point), CycleInterval::Integer(interval)) => {
                point.add(interval).map(Self::Integer)
            }
            (Self::Iso(point), CycleInterval::Iso(interval)) => point.add(interval).map(Self::Iso),
            _ => Err(self.mismatch(interval.type_label())),
        }
    }

    pub fn sub_interval(&self, interval: &CycleInterval) -> Result<Self, CyclingError> {
        match (self, interval) {
            (Self::Integer(point), CycleInterval::Integer(interval)) => {
                point.sub_interval(interval).map(Self::Integer)
            }
            (Self::Iso(point), CycleInterval::Iso(interval)) => {
                point.sub_interval(interval).map(Self::Iso)
            }
            _ => Err(self.mismatch(interval.type_label())),
        }
    }

    /// The interval from `other` up to `self`.
    pub fn diff(&self, other: &Self) -> Result<CycleInterval, CyclingError> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Ok(CycleInterval::Integer(a.diff(b))),
            (Self::Iso(a), Self::Iso(b)) => Ok(CycleInterval::Iso(a.diff(b))),
            _ => Err(self.mismatch(other.type_label())),
        }
    }

    /// A key that totally orders points across flavors: flavor rank first,
    /// then the point's own position.
    pub fn sort_key(&self) -> (u8, i64) {
        match self {
            Self::Integer(point) => (0, point.value()),
            Self::Iso(point) => (1, point.time().timestamp()),
        }
    }

    fn mismatch(&self, right: &'static str) -> CyclingError {
        CyclingError::TypeMismatch {
            left: self.type_label(),
            right,
        }
    }
}

impl PartialOrd for CyclePoint {
    /// Points of different flavors have no ordering.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.partial_cmp(b),
            (Self::Iso(a), Self::Iso(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for CyclePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(point) => point.fmt(f),
            Self::Iso(point) => point.fmt(f),
        }
    }
}

impl From<IntegerPoint> for CyclePoint {
    fn from(point: IntegerPoint) -> Self {
        Self::Integer(point)
    }
}

impl From<IsoPoint> for CyclePoint {
    fn from(point: IsoPoint) -> Self {
        Self::Iso(point)
    }
}

#[cfg(test)]
#[path = "point_tests.rs"]
mod tests;
