// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integer cycling
//!
//! Points are plain integers and intervals are `P<n>` counts. Recurrences
//! follow the shared format table in [`crate::parse`], with membership and
//! navigation done by remainder arithmetic on the step. Negative steps are
//! not supported in this flavor.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CyclingError;
use crate::interval::IntervalOps;
use crate::parse::{classify_integer, parse_exclusion, RecurrenceKind, RecurrenceSpec};
use crate::point::PointOps;
use crate::sequence::{SequenceOps, EXCLUSION_SCAN_LIMIT};

/// Flavor label used in error messages and cross-flavor sort keys.
pub const INTEGER_TYPE: &str = "integer";

#[allow(clippy::expect_used)]
static INTERVAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-])?P(\d+)$").expect("constant regex pattern is valid"));

/// A point on an integer cycling axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntegerPoint(i64);

impl IntegerPoint {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Parse an absolute point. Leading zeros and whitespace are
    /// normalized away.
    pub fn parse(expr: &str) -> Result<Self, CyclingError> {
        expr.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| CyclingError::PointParsing {
                point_type: INTEGER_TYPE,
                value: expr.to_string(),
            })
    }

    /// Resolve a point slot: absolute text, a signed `P` offset applied to
    /// the context point, or the context point itself when the slot is
    /// empty.
    pub fn from_expression(
        expr: Option<&str>,
        context: Option<IntegerPoint>,
        required: bool,
    ) -> Result<Option<Self>, CyclingError> {
        let Some(expr) = expr else {
            if context.is_none() && required {
                return Err(CyclingError::MissingContextPoint {
                    value: String::new(),
                });
            }
            return Ok(context);
        };
        if expr.starts_with('+') || expr.starts_with('-') {
            let offset = IntegerInterval::parse(expr)?;
            let Some(context) = context else {
                return Err(CyclingError::MissingContextPoint {
                    value: expr.to_string(),
                });
            };
            return Ok(Some(context + offset));
        }
        Ok(Some(Self::parse(expr)?))
    }
}

impl fmt::Display for IntegerPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for IntegerPoint {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Add<IntegerInterval> for IntegerPoint {
    type Output = IntegerPoint;
    fn add(self, rhs: IntegerInterval) -> IntegerPoint {
        IntegerPoint(self.0 + rhs.value)
    }
}

impl Sub<IntegerInterval> for IntegerPoint {
    type Output = IntegerPoint;
    fn sub(self, rhs: IntegerInterval) -> IntegerPoint {
        IntegerPoint(self.0 - rhs.value)
    }
}

impl Sub for IntegerPoint {
    type Output = IntegerInterval;
    fn sub(self, rhs: IntegerPoint) -> IntegerInterval {
        IntegerInterval::from_integer(self.0 - rhs.0)
    }
}

impl PointOps for IntegerPoint {
    type Interval = IntegerInterval;

    fn type_label() -> &'static str {
        INTEGER_TYPE
    }

    // Parsing already normalizes, so there is nothing left to reformat.
    fn standardise(self) -> Self {
        self
    }

    fn add(&self, interval: &IntegerInterval) -> Result<Self, CyclingError> {
        Ok(*self + *interval)
    }

    fn sub_interval(&self, interval: &IntegerInterval) -> Result<Self, CyclingError> {
        Ok(*self - *interval)
    }

    fn diff(&self, other: &Self) -> IntegerInterval {
        *self - *other
    }
}

/// A signed integer interval, rendered `P<n>` with an optional sign.
///
/// Equality, ordering and hashing go by the numeric value alone; the
/// rendered sign is presentation only, so `+P0` (the null offset) compares
/// equal to `P0` (the null interval).
#[derive(Debug, Clone, Copy)]
pub struct IntegerInterval {
    value: i64,
    explicit_plus: bool,
}

impl IntegerInterval {
    pub fn from_integer(value: i64) -> Self {
        Self {
            value,
            explicit_plus: false,
        }
    }

    pub fn parse(expr: &str) -> Result<Self, CyclingError> {
        let err = || CyclingError::IntervalParsing {
            interval_type: INTEGER_TYPE,
            value: expr.to_string(),
        };
        let caps = INTERVAL_RE.captures(expr.trim()).ok_or_else(err)?;
        let magnitude: i64 = caps[2].parse().map_err(|_| err())?;
        let sign = caps.get(1).map(|m| m.as_str());
        Ok(Self {
            value: if sign == Some("-") {
                -magnitude
            } else {
                magnitude
            },
            explicit_plus: sign == Some("+"),
        })
    }

    pub fn value(self) -> i64 {
        self.value
    }
}

impl fmt::Display for IntegerInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value < 0 {
            write!(f, "-P{}", -self.value)
        } else if self.explicit_plus {
            write!(f, "+P{}", self.value)
        } else {
            write!(f, "P{}", self.value)
        }
    }
}

impl PartialEq for IntegerInterval {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for IntegerInterval {}

impl PartialOrd for IntegerInterval {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IntegerInterval {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for IntegerInterval {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Add for IntegerInterval {
    type Output = IntegerInterval;
    fn add(self, rhs: IntegerInterval) -> IntegerInterval {
        Self::from_integer(self.value + rhs.value)
    }
}

impl Sub for IntegerInterval {
    type Output = IntegerInterval;
    fn sub(self, rhs: IntegerInterval) -> IntegerInterval {
        Self::from_integer(self.value - rhs.value)
    }
}

impl Neg for IntegerInterval {
    type Output = IntegerInterval;
    fn neg(self) -> IntegerInterval {
        Self::from_integer(-self.value)
    }
}

impl Mul<i64> for IntegerInterval {
    type Output = IntegerInterval;
    fn mul(self, rhs: i64) -> IntegerInterval {
        Self::from_integer(self.value * rhs)
    }
}

impl IntervalOps for IntegerInterval {
    fn type_label() -> &'static str {
        INTEGER_TYPE
    }

    fn get_null() -> Self {
        Self::from_integer(0)
    }

    fn get_null_offset() -> Self {
        Self {
            value: 0,
            explicit_plus: true,
        }
    }

    fn is_null(&self) -> bool {
        self.value == 0
    }

    fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
            explicit_plus: self.explicit_plus,
        }
    }

    fn negated(&self) -> Self {
        -*self
    }

    fn scale(&self, factor: i64) -> Self {
        *self * factor
    }

    fn add(&self, other: &Self) -> Result<Self, CyclingError> {
        Ok(*self + *other)
    }

    fn sub(&self, other: &Self) -> Result<Self, CyclingError> {
        Ok(*self - *other)
    }
}

/// Points and nested recurrences removed from a sequence.
///
/// Each entry is tried as a point first (absolute, or an offset resolved
/// against the parent's resolved start) and as a nested recurrence second,
/// built against the parent's resolved bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerExclusions {
    points: Vec<IntegerPoint>,
    sequences: Vec<IntegerSequence>,
}

impl IntegerExclusions {
    fn build(
        entries: &[String],
        context_start: IntegerPoint,
        context_stop: Option<IntegerPoint>,
    ) -> Result<Self, CyclingError> {
        let mut points = Vec::new();
        let mut sequences = Vec::new();
        for entry in entries {
            match IntegerPoint::from_expression(Some(entry), Some(context_start), false) {
                Ok(Some(point)) => {
                    if !points.contains(&point) {
                        points.push(point);
                    }
                }
                Ok(None) | Err(_) => {
                    match IntegerSequence::new(entry, context_start, context_stop) {
                        Ok(sequence) => sequences.push(sequence),
                        Err(_) => {
                            return Err(CyclingError::ExclusionParsing {
                                value: entry.clone(),
                            })
                        }
                    }
                }
            }
        }
        Ok(Self { points, sequences })
    }

    pub fn contains(&self, point: &IntegerPoint) -> bool {
        self.points.contains(point) || self.sequences.iter().any(|s| s.is_valid(point))
    }

    pub fn points(&self) -> &[IntegerPoint] {
        &self.points
    }

    pub fn sequences(&self) -> &[IntegerSequence] {
        &self.sequences
    }
}

impl Hash for IntegerExclusions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.points.hash(state);
        for sequence in &self.sequences {
            sequence.hash(state);
        }
    }
}

impl fmt::Display for IntegerExclusions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.points.iter().map(ToString::to_string).collect();
        parts.extend(self.sequences.iter().map(ToString::to_string));
        if parts.len() == 1 {
            write!(f, "!{}", parts[0])
        } else {
            write!(f, "!({})", parts.join(","))
        }
    }
}

/// A recurrence over integer points.
///
/// Equality and hashing cover the resolved step, bounds and exclusions,
/// so the same grid written two ways compares equal.
#[derive(Debug, Clone)]
pub struct IntegerSequence {
    value: String,
    start: IntegerPoint,
    stop: Option<IntegerPoint>,
    step: Option<IntegerInterval>,
    offset: IntegerInterval,
    exclusions: Option<IntegerExclusions>,
    context_start: IntegerPoint,
    context_stop: Option<IntegerPoint>,
}

impl IntegerSequence {
    /// Build a sequence from a recurrence expression and context bounds.
    pub fn new(
        expr: &str,
        context_start: impl Into<IntegerPoint>,
        context_stop: Option<impl Into<IntegerPoint>>,
    ) -> Result<Self, CyclingError> {
        let context_start = context_start.into();
        let context_stop = context_stop.map(Into::into);
        let trimmed = expr.trim();
        let (core, exclusion_entries) = parse_exclusion(trimmed)?;
        let spec = classify_integer(&core)?;
        let mut sequence = Self::from_spec(trimmed, spec, context_start, context_stop)?;
        sequence.snap_into_context();
        if !exclusion_entries.is_empty() {
            // Exclusions anchor at the resolved bounds, not the raw window.
            sequence.exclusions = Some(IntegerExclusions::build(
                &exclusion_entries,
                sequence.start,
                sequence.stop,
            )?);
        }
        Ok(sequence)
    }

    fn from_spec(
        value: &str,
        spec: RecurrenceSpec,
        context_start: IntegerPoint,
        context_stop: Option<IntegerPoint>,
    ) -> Result<Self, CyclingError> {
        let step = spec
            .interval
            .as_deref()
            .map(IntegerInterval::parse)
            .transpose()?;
        if step.is_some_and(|s| s.value() < 0) {
            return Err(CyclingError::Unsupported {
                expr: value.to_string(),
                feature: "negative interval step".to_string(),
            });
        }
        let reps = spec
            .reps
            .map(i64::try_from)
            .transpose()
            .map_err(|_| CyclingError::SequenceParsing {
                expr: value.to_string(),
                reason: "repeat count out of range".to_string(),
            })?;

        let (start, stop, step) = match spec.kind {
            RecurrenceKind::Bounded => {
                let start = resolve_point(spec.start.as_deref(), Some(context_start))?;
                let stop = resolve_point(spec.end.as_deref(), context_stop)?;
                let reps = reps.unwrap_or(1);
                if reps <= 1 {
                    (start, Some(start), None)
                } else {
                    let span = (stop - start).value();
                    if span < 0 {
                        return Err(CyclingError::Unsupported {
                            expr: value.to_string(),
                            feature: "backward bounds (negative step)".to_string(),
                        });
                    }
                    // Uneven spans floor toward the start; the last point
                    // may then fall short of the end bound.
                    let step = IntegerInterval::from_integer(span.div_euclid(reps - 1));
                    (start, Some(stop), Some(step))
                }
            }
            RecurrenceKind::FromStart => {
                let start = resolve_point(spec.start.as_deref(), Some(context_start))?;
                match (reps, step) {
                    (Some(1), _) | (_, None) => (start, Some(start), None),
                    (Some(n), Some(step)) => (start, Some(start + step * (n - 1)), Some(step)),
                    (None, Some(step)) => (start, context_stop, Some(step)),
                }
            }
            RecurrenceKind::FromEnd => {
                let stop = resolve_point(spec.end.as_deref(), context_stop)?;
                match (reps, step) {
                    (Some(1), _) | (_, None) => (stop, Some(stop), None),
                    (Some(n), Some(step)) => (stop - step * (n - 1), Some(stop), Some(step)),
                    (None, Some(step)) if step.value() == 0 => (stop, Some(stop), Some(step)),
                    (None, Some(step)) => {
                        // Align the start bound onto the grid anchored at
                        // the end point.
                        let rem = (stop - context_start).value().rem_euclid(step.value());
                        (
                            context_start + IntegerInterval::from_integer(rem),
                            Some(stop),
                            Some(step),
                        )
                    }
                }
            }
        };

        Ok(Self {
            value: value.to_string(),
            start,
            stop,
            step,
            offset: IntegerInterval::get_null(),
            exclusions: None,
            context_start,
            context_stop,
        })
    }

    /// Move the resolved bounds back inside the context window, keeping
    /// them on the step grid.
    fn snap_into_context(&mut self) {
        let Some(step) = self.step else { return };
        if step.value() == 0 {
            return;
        }
        if self.start < self.context_start {
            let gap = (self.context_start - self.start).value();
            let rem = gap.rem_euclid(step.value());
            let bump = if rem > 0 { step.value() - rem } else { 0 };
            self.start = self.start + IntegerInterval::from_integer(gap + bump);
        }
        if let (Some(stop), Some(context_stop)) = (self.stop, self.context_stop) {
            if stop > context_stop {
                self.stop = Some(context_stop);
            }
        }
        // The stop bound itself sits on the grid; a raw window edge or an
        // unevenly divided span steps down to the last hit.
        if let Some(stop) = self.stop {
            let rem = (stop - self.start).value().rem_euclid(step.value());
            if rem > 0 {
                self.stop = Some(stop - IntegerInterval::from_integer(rem));
            }
        }
    }

    /// Express a one-off recurrence at the given point, or at the context
    /// start when no point is given.
    pub fn get_async_expr(point: Option<IntegerPoint>) -> String {
        match point {
            Some(point) => format!("R1/{point}"),
            None => "R1".to_string(),
        }
    }

    pub fn step(&self) -> Option<IntegerInterval> {
        self.step
    }

    pub fn exclusions(&self) -> Option<&IntegerExclusions> {
        self.exclusions.as_ref()
    }

    pub fn accumulated_offset(&self) -> IntegerInterval {
        self.offset
    }

    fn in_bounds(&self, point: IntegerPoint) -> bool {
        point >= self.start && self.stop.map_or(true, |stop| point <= stop)
    }

    fn is_excluded(&self, point: &IntegerPoint) -> bool {
        self.exclusions.as_ref().is_some_and(|e| e.contains(point))
    }

    fn degenerate_at(&self, point: &IntegerPoint) -> CyclingError {
        CyclingError::SequenceDegenerate {
            expr: self.value.clone(),
            point: point.to_string(),
        }
    }

    fn exclusion_limit_at(&self, point: &IntegerPoint) -> CyclingError {
        CyclingError::ExclusionLimit {
            expr: self.value.clone(),
            point: point.to_string(),
            limit: EXCLUSION_SCAN_LIMIT,
        }
    }
}

fn resolve_point(
    expr: Option<&str>,
    context: Option<IntegerPoint>,
) -> Result<IntegerPoint, CyclingError> {
    match IntegerPoint::from_expression(expr, context, true)? {
        Some(point) => Ok(point),
        None => Err(CyclingError::MissingContextPoint {
            value: expr.unwrap_or_default().to_string(),
        }),
    }
}

impl PartialEq for IntegerSequence {
    fn eq(&self, other: &Self) -> bool {
        self.step == other.step
            && self.start == other.start
            && self.stop == other.stop
            && self.exclusions == other.exclusions
    }
}

impl Eq for IntegerSequence {}

impl Hash for IntegerSequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.step.hash(state);
        self.start.hash(state);
        self.stop.hash(state);
        self.exclusions.hash(state);
    }
}

impl fmt::Display for IntegerSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl SequenceOps for IntegerSequence {
    type Point = IntegerPoint;

    fn is_on_sequence(&self, point: &IntegerPoint) -> bool {
        if self.is_excluded(point) {
            return false;
        }
        match self.step {
            None => *point == self.start,
            Some(step) if step.value() == 0 => *point == self.start,
            Some(step) => (*point - self.start).value().rem_euclid(step.value()) == 0,
        }
    }

    fn is_valid(&self, point: &IntegerPoint) -> bool {
        self.is_on_sequence(point) && self.in_bounds(*point)
    }

    fn get_prev_point(&self, point: &IntegerPoint) -> Result<Option<IntegerPoint>, CyclingError> {
        let Some(step) = self.step else {
            return Ok(None);
        };
        if step.value() == 0 {
            return Err(self.degenerate_at(point));
        }
        let mut cursor = *point;
        for _ in 0..EXCLUSION_SCAN_LIMIT {
            let rem = (cursor - self.start).value().rem_euclid(step.value());
            let prev = if rem > 0 {
                cursor - IntegerInterval::from_integer(rem)
            } else {
                cursor - step
            };
            if self.is_excluded(&prev) {
                cursor = prev;
                continue;
            }
            return Ok(if self.in_bounds(prev) { Some(prev) } else { None });
        }
        Err(self.exclusion_limit_at(point))
    }

    fn get_nearest_prev_point(
        &self,
        point: &IntegerPoint,
    ) -> Result<Option<IntegerPoint>, CyclingError> {
        // The largest on-sequence point at or below the query is the query
        // itself whenever that is a valid point.
        if self.is_valid(point) {
            return Ok(Some(*point));
        }
        let Some(step) = self.step else {
            let start = self.start;
            return Ok((start < *point && !self.is_excluded(&start)).then_some(start));
        };
        if step.value() == 0 {
            let start = self.start;
            return Ok((start < *point && !self.is_excluded(&start)).then_some(start));
        }
        let rem = (*point - self.start).value().rem_euclid(step.value());
        let mut candidate = if rem > 0 {
            *point - IntegerInterval::from_integer(rem)
        } else {
            *point - step
        };
        // A point past the end bound clamps to the last grid point.
        if let Some(stop) = self.stop {
            if candidate > stop {
                let stop_rem = (stop - self.start).value().rem_euclid(step.value());
                candidate = stop - IntegerInterval::from_integer(stop_rem);
            }
        }
        for _ in 0..EXCLUSION_SCAN_LIMIT {
            if candidate < self.start {
                return Ok(None);
            }
            if !self.is_excluded(&candidate) {
                return Ok(Some(candidate));
            }
            candidate = candidate - step;
        }
        Err(self.exclusion_limit_at(point))
    }

    fn get_next_point(&self, point: &IntegerPoint) -> Result<Option<IntegerPoint>, CyclingError> {
        let Some(step) = self.step else {
            let start = self.start;
            return Ok((*point < start && !self.is_excluded(&start)).then_some(start));
        };
        if step.value() == 0 {
            return Err(self.degenerate_at(point));
        }
        let mut candidate = if *point < self.start {
            self.start
        } else {
            let rem = (*point - self.start).value().rem_euclid(step.value());
            *point + IntegerInterval::from_integer(step.value() - rem)
        };
        for _ in 0..EXCLUSION_SCAN_LIMIT {
            if !self.in_bounds(candidate) {
                return Ok(None);
            }
            if !self.is_excluded(&candidate) {
                return Ok(Some(candidate));
            }
            candidate = candidate + step;
        }
        Err(self.exclusion_limit_at(point))
    }

    fn get_next_point_on_sequence(
        &self,
        point: &IntegerPoint,
    ) -> Result<Option<IntegerPoint>, CyclingError> {
        let Some(step) = self.step else {
            return Ok(None);
        };
        if step.value() == 0 {
            return Err(self.degenerate_at(point));
        }
        let mut candidate = *point + step;
        for _ in 0..EXCLUSION_SCAN_LIMIT {
            if !self.in_bounds(candidate) {
                return Ok(None);
            }
            if !self.is_excluded(&candidate) {
                return Ok(Some(candidate));
            }
            candidate = candidate + step;
        }
        Err(self.exclusion_limit_at(point))
    }

    fn get_first_point(&self, point: &IntegerPoint) -> Result<Option<IntegerPoint>, CyclingError> {
        let step = match self.step {
            None => {
                let start = self.start;
                return Ok((start >= *point && !self.is_excluded(&start)).then_some(start));
            }
            Some(step) if step.value() == 0 => {
                let start = self.start;
                return Ok((start >= *point && !self.is_excluded(&start)).then_some(start));
            }
            Some(step) => step,
        };
        let mut candidate = if *point <= self.start {
            self.start
        } else {
            let rem = (*point - self.start).value().rem_euclid(step.value());
            if rem == 0 {
                *point
            } else {
                *point + IntegerInterval::from_integer(step.value() - rem)
            }
        };
        for _ in 0..EXCLUSION_SCAN_LIMIT {
            if !self.in_bounds(candidate) {
                return Ok(None);
            }
            if !self.is_excluded(&candidate) {
                return Ok(Some(candidate));
            }
            candidate = candidate + step;
        }
        Err(self.exclusion_limit_at(point))
    }

    fn get_start_point(&self) -> Result<Option<IntegerPoint>, CyclingError> {
        if !self.is_excluded(&self.start) {
            return Ok(Some(self.start));
        }
        self.get_next_point(&self.start)
    }

    fn get_stop_point(&self) -> Result<Option<IntegerPoint>, CyclingError> {
        let Some(stop) = self.stop else {
            return Ok(None);
        };
        if !self.is_excluded(&stop) {
            return Ok(Some(stop));
        }
        self.get_prev_point(&stop)
    }

    /// Shift the whole sequence by an interval, snapping the shifted
    /// bounds back into the context window. Kept for compatibility with
    /// older graph offset syntax.
    fn set_offset(&mut self, offset: &IntegerInterval) -> Result<(), CyclingError> {
        if offset.is_null() {
            return Ok(());
        }
        self.offset = self.offset + *offset;
        self.start = self.start + *offset;
        self.stop = self.stop.map(|stop| stop + *offset);
        self.snap_into_context();
        Ok(())
    }
}

#[cfg(test)]
#[path = "integer_tests.rs"]
mod tests;
