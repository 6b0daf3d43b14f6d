// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cycle interval abstraction
//!
//! Intervals separate a null interval (`P0`, additive identity) from a
//! null offset (`+P0`), which carries an explicit sign so offset lists
//! round-trip through display unchanged. The two compare equal; the
//! distinction is presentation only.

use std::fmt;
use std::hash::Hash;

use crate::error::CyclingError;
use crate::integer::IntegerInterval;
use crate::iso8601::IsoInterval;

/// Operations every cycle interval type provides.
pub trait IntervalOps: Clone + fmt::Display + PartialEq + Sized {
    /// Flavor label used in error messages.
    fn type_label() -> &'static str;

    /// The zero-width interval.
    fn get_null() -> Self;

    /// The zero-width interval rendered with an explicit `+`.
    fn get_null_offset() -> Self;

    fn is_null(&self) -> bool;

    fn abs(&self) -> Self;

    fn negated(&self) -> Self;

    fn scale(&self, factor: i64) -> Self;

    fn add(&self, other: &Self) -> Result<Self, CyclingError>;

    fn sub(&self, other: &Self) -> Result<Self, CyclingError>;
}

/// A cycle interval of either flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleInterval {
    Integer(IntegerInterval),
    Iso(IsoInterval),
}

impl CycleInterval {
    pub fn parse_integer(expr: &str) -> Result<Self, CyclingError> {
        IntegerInterval::parse(expr).map(Self::Integer)
    }

    pub fn parse_iso(expr: &str) -> Result<Self, CyclingError> {
        IsoInterval::parse(expr).map(Self::Iso)
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Integer(_) => IntegerInterval::type_label(),
            Self::Iso(_) => IsoInterval::type_label(),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Self::Integer(interval) => interval.is_null(),
            Self::Iso(interval) => interval.is_null(),
        }
    }

    pub fn abs(&self) -> Self {
        match self {
            Self::Integer(interval) => Self::Integer(interval.abs()),
            Self::Iso(interval) => Self::Iso(interval.abs()),
        }
    }

    pub fn negated(&self) -> Self {
        match self {
            Self::Integer(interval) => Self::Integer(interval.negated()),
            Self::Iso(interval) => Self::Iso(interval.negated()),
        }
    }

    pub fn scale(&self, factor: i64) -> Self {
        match self {
            Self::Integer(interval) => Self::Integer(interval.scale(factor)),
            Self::Iso(interval) => Self::Iso(interval.scale(factor)),
        }
    }

    pub fn add(&self, other: &Self) -> Result<Self, CyclingError> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.add(b).map(Self::Integer),
            (Self::Iso(a), Self::Iso(b)) => a.add(b).map(Self::Iso),
            _ => Err(self.mismatch(other)),
        }
    }

    pub fn sub(&self, other: &Self) -> Result<Self, CyclingError> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.sub(b).map(Self::Integer),
            (Self::Iso(a), Self::Iso(b)) => a.sub(b).map(Self::Iso),
            _ => Err(self.mismatch(other)),
        }
    }

    fn mismatch(&self, other: &Self) -> CyclingError {
        CyclingError::TypeMismatch {
            left: self.type_label(),
            right: other.type_label(),
        }
    }
}

impl fmt::Display for CycleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(interval) => interval.fmt(f),
            Self::Iso(interval) => interval.fmt(f),
        }
    }
}

impl From<IntegerInterval> for CycleInterval {
    fn from(interval: IntegerInterval) -> Self {
        Self::Integer(interval)
    }
}

impl From<IsoInterval> for CycleInterval {
    fn from(interval: IsoInterval) -> Self {
        Self::Iso(interval)
    }
}

#[cfg(test)]
#[path = "interval_tests.rs"]
mod tests;
