// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Date-time cycling
//!
//! Points wrap a concrete chrono instant plus the expression they were
//! parsed from; intervals are ISO 8601 durations with nominal (year,
//! month) and exact (week, day, time) components. Sequences with an
//! exact step navigate by remainder arithmetic over epoch seconds;
//! nominal steps walk the calendar one step at a time from their anchor,
//! so end-of-month clamping behaves the same way everywhere.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use regex::Regex;

use crate::cache::BoundedCache;
use crate::config::IsoConfig;
use crate::error::CyclingError;
use crate::interval::IntervalOps;
use crate::isotime::{self, ISO_TYPE};
use crate::parse::{classify_iso, parse_exclusion, RecurrenceKind, RecurrenceSpec};
use crate::point::PointOps;
use crate::resolve;
use crate::sequence::{SequenceOps, EXCLUSION_SCAN_LIMIT};

/// Capacity of the per-sequence navigation caches.
pub(crate) const NAV_CACHE_SIZE: usize = 100;

/// Iteration cap for calendar walks with nominal steps.
const NOMINAL_WALK_LIMIT: usize = 100_000;

#[allow(clippy::expect_used)]
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([+-])?P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$",
    )
    .expect("constant regex pattern is valid")
});

/// A date-time cycle point: the expression it came from plus the instant
/// it denotes. Comparison, equality and hashing go by the instant, so a
/// point compares the same before and after standardisation.
#[derive(Debug, Clone)]
pub struct IsoPoint {
    value: String,
    time: DateTime<FixedOffset>,
    config: IsoConfig,
}

impl IsoPoint {
    /// Parse a complete date-time expression.
    pub fn parse(expr: &str, config: &IsoConfig) -> Result<Self, CyclingError> {
        let trimmed = expr.trim();
        let time = isotime::parse_point(trimmed, config)?;
        Ok(Self {
            value: trimmed.to_string(),
            time,
            config: *config,
        })
    }

    /// Resolve any point expression, including truncated forms,
    /// `previous()`/`next()`/`min()` selectors, `now`, and trailing
    /// offset chains, against an optional context point.
    pub fn resolve(
        expr: &str,
        context: Option<&IsoPoint>,
        config: &IsoConfig,
    ) -> Result<Self, CyclingError> {
        let context_time = context.map(|point| point.time);
        let time = resolve::resolve_expr(expr, context_time.as_ref(), config)?;
        Ok(Self::from_time(time, config))
    }

    /// Wrap an instant, rendering the canonical expression for it.
    pub fn from_time(time: DateTime<FixedOffset>, config: &IsoConfig) -> Self {
        Self {
            value: isotime::dump_point(&time, config),
            time,
            config: *config,
        }
    }

    pub fn time(&self) -> DateTime<FixedOffset> {
        self.time
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn config(&self) -> IsoConfig {
        self.config
    }

    pub(crate) fn epoch(&self) -> i64 {
        self.time.timestamp()
    }
}

impl fmt::Display for IsoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl PartialEq for IsoPoint {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl Eq for IsoPoint {}

impl PartialOrd for IsoPoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IsoPoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time.cmp(&other.time)
    }
}

impl Hash for IsoPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.time.timestamp().hash(state);
    }
}

impl PointOps for IsoPoint {
    type Interval = IsoInterval;

    fn type_label() -> &'static str {
        ISO_TYPE
    }

    fn standardise(self) -> Self {
        Self::from_time(self.time, &self.config)
    }

    fn add(&self, interval: &IsoInterval) -> Result<Self, CyclingError> {
        let (months, days, seconds) = interval.shift_parts();
        let time = isotime::shift(&self.time, months, days, seconds)?;
        Ok(Self::from_time(time, &self.config))
    }

    fn sub_interval(&self, interval: &IsoInterval) -> Result<Self, CyclingError> {
        self.add(&interval.negated())
    }

    fn diff(&self, other: &Self) -> IsoInterval {
        IsoInterval::from_seconds((self.time - other.time).num_seconds())
    }
}

/// An ISO 8601 duration. The sign applies to the whole duration; the
/// nominal part (years, months) shifts calendar months with end-of-month
/// clamping while the rest is exact.
///
/// Equality and hashing reduce to (total months, total exact seconds),
/// so `P1D` equals `PT24H` and `+P0Y` equals `P0Y`.
#[derive(Debug, Clone, Copy)]
pub struct IsoInterval {
    negative: bool,
    explicit_plus: bool,
    years: u64,
    months: u64,
    weeks: u64,
    days: u64,
    hours: u64,
    minutes: u64,
    seconds: u64,
}

impl IsoInterval {
    pub fn parse(expr: &str) -> Result<Self, CyclingError> {
        let err = || CyclingError::IntervalParsing {
            interval_type: ISO_TYPE,
            value: expr.to_string(),
        };
        let trimmed = expr.trim();
        let caps = DURATION_RE.captures(trimmed).ok_or_else(err)?;
        let field = |idx: usize| -> Result<u64, CyclingError> {
            match caps.get(idx) {
                Some(m) => m.as_str().parse().map_err(|_| err()),
                None => Ok(0),
            }
        };
        let out = Self {
            negative: caps.get(1).is_some_and(|m| m.as_str() == "-"),
            explicit_plus: caps.get(1).is_some_and(|m| m.as_str() == "+"),
            years: field(2)?,
            months: field(3)?,
            weeks: field(4)?,
            days: field(5)?,
            hours: field(6)?,
            minutes: field(7)?,
            seconds: field(8)?,
        };
        let any_component = (2..=8).any(|idx| caps.get(idx).is_some());
        if !any_component {
            return Err(err());
        }
        let any_time = (6..=8).any(|idx| caps.get(idx).is_some());
        if trimmed.contains('T') && !any_time {
            return Err(err());
        }
        Ok(out)
    }

    /// An exact duration from a count of seconds, as days plus time.
    pub fn from_seconds(seconds: i64) -> Self {
        let negative = seconds < 0;
        let magnitude = seconds.unsigned_abs();
        Self {
            negative,
            explicit_plus: false,
            years: 0,
            months: 0,
            weeks: 0,
            days: magnitude / 86_400,
            hours: magnitude % 86_400 / 3_600,
            minutes: magnitude % 3_600 / 60,
            seconds: magnitude % 60,
        }
    }

    fn sign(&self) -> i64 {
        if self.negative {
            -1
        } else {
            1
        }
    }

    /// Total nominal months, signed.
    pub(crate) fn signed_months(&self) -> i64 {
        self.sign() * (self.years as i64 * 12 + self.months as i64)
    }

    /// Total exact seconds of the week/day/time part, signed.
    pub(crate) fn signed_seconds(&self) -> i64 {
        self.sign()
            * ((self.weeks as i64 * 7 + self.days as i64) * 86_400
                + self.hours as i64 * 3_600
                + self.minutes as i64 * 60
                + self.seconds as i64)
    }

    /// The (months, days, seconds) shift triple, each signed. Months are
    /// applied to a point first, then days, then seconds.
    pub(crate) fn shift_parts(&self) -> (i64, i64, i64) {
        (
            self.signed_months(),
            self.sign() * (self.weeks as i64 * 7 + self.days as i64),
            self.sign()
                * (self.hours as i64 * 3_600 + self.minutes as i64 * 60 + self.seconds as i64),
        )
    }

    /// Total seconds when the duration has no nominal part.
    pub(crate) fn exact_seconds(&self) -> Option<i64> {
        (self.signed_months() == 0).then(|| self.signed_seconds())
    }

    /// Rebuild from reduced totals. Mixed signs across the nominal and
    /// exact parts have no single duration form and are rejected.
    fn from_reduced(months: i64, seconds: i64) -> Result<Self, CyclingError> {
        if months != 0 && seconds != 0 && (months < 0) != (seconds < 0) {
            return Err(CyclingError::IntervalArithmetic {
                detail: format!("{months} months combined with {seconds} seconds"),
            });
        }
        let negative = months < 0 || seconds < 0;
        let month_magnitude = months.unsigned_abs();
        let second_magnitude = seconds.unsigned_abs();
        Ok(Self {
            negative,
            explicit_plus: false,
            years: month_magnitude / 12,
            months: month_magnitude % 12,
            weeks: 0,
            days: second_magnitude / 86_400,
            hours: second_magnitude % 86_400 / 3_600,
            minutes: second_magnitude % 3_600 / 60,
            seconds: second_magnitude % 60,
        })
    }
}

impl fmt::Display for IsoInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.explicit_plus && !self.negative {
            f.write_str("+")?;
        } else if self.negative && !self.is_null() {
            f.write_str("-")?;
        }
        if self.is_null() {
            return f.write_str("P0Y");
        }
        f.write_str("P")?;
        for (value, unit) in [
            (self.years, "Y"),
            (self.months, "M"),
            (self.weeks, "W"),
            (self.days, "D"),
        ] {
            if value != 0 {
                write!(f, "{value}{unit}")?;
            }
        }
        if self.hours != 0 || self.minutes != 0 || self.seconds != 0 {
            f.write_str("T")?;
            for (value, unit) in [
                (self.hours, "H"),
                (self.minutes, "M"),
                (self.seconds, "S"),
            ] {
                if value != 0 {
                    write!(f, "{value}{unit}")?;
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for IsoInterval {
    fn eq(&self, other: &Self) -> bool {
        self.signed_months() == other.signed_months()
            && self.signed_seconds() == other.signed_seconds()
    }
}

impl Eq for IsoInterval {}

impl Hash for IsoInterval {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signed_months().hash(state);
        self.signed_seconds().hash(state);
    }
}

impl IntervalOps for IsoInterval {
    fn type_label() -> &'static str {
        ISO_TYPE
    }

    fn get_null() -> Self {
        Self::from_seconds(0)
    }

    fn get_null_offset() -> Self {
        Self {
            explicit_plus: true,
            ..Self::from_seconds(0)
        }
    }

    fn is_null(&self) -> bool {
        self.signed_months() == 0 && self.signed_seconds() == 0
    }

    fn abs(&self) -> Self {
        Self {
            negative: false,
            ..*self
        }
    }

    fn negated(&self) -> Self {
        if self.is_null() {
            return *self;
        }
        Self {
            negative: !self.negative,
            ..*self
        }
    }

    fn scale(&self, factor: i64) -> Self {
        let mut out = *self;
        out.negative = self.negative != (factor < 0);
        let magnitude = factor.unsigned_abs();
        for field in [
            &mut out.years,
            &mut out.months,
            &mut out.weeks,
            &mut out.days,
            &mut out.hours,
            &mut out.minutes,
            &mut out.seconds,
        ] {
            *field = field.saturating_mul(magnitude);
        }
        out
    }

    fn add(&self, other: &Self) -> Result<Self, CyclingError> {
        Self::from_reduced(
            self.signed_months() + other.signed_months(),
            self.signed_seconds() + other.signed_seconds(),
        )
    }

    fn sub(&self, other: &Self) -> Result<Self, CyclingError> {
        self.add(&other.negated())
    }
}

/// Points and nested recurrences removed from a date-time sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct IsoExclusions {
    points: Vec<IsoPoint>,
    sequences: Vec<IsoSequence>,
}

impl IsoExclusions {
    fn build(
        entries: &[String],
        context_start: &IsoPoint,
        context_stop: Option<&IsoPoint>,
    ) -> Result<Self, CyclingError> {
        let config = context_start.config();
        let mut points = Vec::new();
        let mut sequences = Vec::new();
        for entry in entries {
            match IsoPoint::resolve(entry, Some(context_start), &config) {
                Ok(point) => {
                    if !points.contains(&point) {
                        points.push(point);
                    }
                }
                Err(_) => match IsoSequence::new(entry, context_start, context_stop) {
                    Ok(sequence) => sequences.push(sequence),
                    Err(_) => {
                        return Err(CyclingError::ExclusionParsing {
                            value: entry.clone(),
                        })
                    }
                },
            }
        }
        Ok(Self { points, sequences })
    }

    pub fn contains(&self, point: &IsoPoint) -> bool {
        self.points.contains(point) || self.sequences.iter().any(|s| s.is_valid(point))
    }

    pub fn points(&self) -> &[IsoPoint] {
        &self.points
    }

    pub fn sequences(&self) -> &[IsoSequence] {
        &self.sequences
    }
}

impl Hash for IsoExclusions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.points.hash(state);
        for sequence in &self.sequences {
            sequence.hash(state);
        }
    }
}

impl fmt::Display for IsoExclusions {
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

#[derive(Debug)]
struct NavCaches {
    valid: BoundedCache<i64, bool>,
    next: BoundedCache<i64, Option<IsoPoint>>,
}

impl NavCaches {
    fn new() -> Self {
        Self {
            valid: BoundedCache::new(NAV_CACHE_SIZE),
            next: BoundedCache::new(NAV_CACHE_SIZE),
        }
    }
}

/// How a sequence's points are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grid {
    /// A single point.
    OneOff,
    /// A zero-width step: navigation cannot move.
    Degenerate,
    /// A fixed number of seconds; remainder arithmetic applies.
    Exact { step: i64 },
    /// Nominal step, anchored at the start point, walking forward.
    NominalUp,
    /// Nominal step, anchored at the end point, walking backward.
    NominalDown,
}

/// A recurrence over date-time points.
#[derive(Debug)]
pub struct IsoSequence {
    value: String,
    config: IsoConfig,
    step: Option<IsoInterval>,
    anchor_at_stop: bool,
    start: IsoPoint,
    stop: Option<IsoPoint>,
    offset: IsoInterval,
    exclusions: Option<IsoExclusions>,
    context_start: IsoPoint,
    context_stop: Option<IsoPoint>,
    caches: Mutex<NavCaches>,
}

impl IsoSequence {
    /// Build a sequence from a recurrence expression and context bounds.
    /// The context start's configuration governs parsing and dumping.
    pub fn new(
        expr: &str,
        context_start: &IsoPoint,
        context_stop: Option<&IsoPoint>,
    ) -> Result<Self, CyclingError> {
        let config = context_start.config();
        let trimmed = expr.trim();
        let (core, exclusion_entries) = parse_exclusion(trimmed)?;
        let spec = classify_iso(&core)?;
        let mut sequence = Self::from_spec(trimmed, spec, &config, context_start, context_stop)?;
        sequence.snap_into_context()?;
        if !exclusion_entries.is_empty() {
            // Exclusions anchor at the resolved bounds, not the raw window.
            let exclusions = IsoExclusions::build(
                &exclusion_entries,
                &sequence.start,
                sequence.stop.as_ref(),
            )?;
            sequence.exclusions = Some(exclusions);
        }
        Ok(sequence)
    }

    fn from_spec(
        value: &str,
        spec: RecurrenceSpec,
        config: &IsoConfig,
        context_start: &IsoPoint,
        context_stop: Option<&IsoPoint>,
    ) -> Result<Self, CyclingError> {
        let step = spec
            .interval
            .as_deref()
            .map(IsoInterval::parse)
            .transpose()?;
        let reps = spec
            .reps
            .map(i64::try_from)
            .transpose()
            .map_err(|_| CyclingError::SequenceParsing {
                expr: value.to_string(),
                reason: "repeat count out of range".to_string(),
            })?;
        let resolve_slot = |slot: Option<&str>,
                            context: Option<&IsoPoint>|
         -> Result<IsoPoint, CyclingError> {
            match slot {
                Some(text) => IsoPoint::resolve(text, context, config),
                None => context.cloned().ok_or(CyclingError::MissingContextPoint {
                    value: String::new(),
                }),
            }
        };

        let mut anchor_at_stop = false;
        let (start, stop, step) = match spec.kind {
            RecurrenceKind::Bounded => {
                let mut start = resolve_slot(spec.start.as_deref(), Some(context_start))?;
                let mut stop = resolve_slot(spec.end.as_deref(), context_stop)?;
                let reps = reps.unwrap_or(1);
                if reps <= 1 {
                    let stop = start.clone();
                    (start.clone(), Some(stop), None)
                } else {
                    // Backward bounds divide to a negative step; normalize
                    // by swapping so the grid always ascends.
                    if stop < start {
                        std::mem::swap(&mut start, &mut stop);
                    }
                    let span = (stop.time - start.time).num_seconds();
                    let step = IsoInterval::from_seconds(span.div_euclid(reps - 1));
                    (start, Some(stop), Some(step))
                }
            }
            RecurrenceKind::FromStart => {
                let start = resolve_slot(spec.start.as_deref(), Some(context_start))?;
                match (reps, step) {
                    (Some(1), _) | (_, None) => {
                        let stop = start.clone();
                        (start, Some(stop), None)
                    }
                    (Some(n), Some(step)) => {
                        let stop = walk_n(&start, &step, n - 1, true, config)?;
                        (start, Some(stop), Some(step))
                    }
                    (None, Some(step)) => (start, context_stop.cloned(), Some(step)),
                }
            }
            RecurrenceKind::FromEnd => {
                let stop = resolve_slot(spec.end.as_deref(), context_stop)?;
                match (reps, step) {
                    (Some(1), _) | (_, None) => (stop.clone(), Some(stop), None),
                    (Some(n), Some(step)) => {
                        anchor_at_stop = step.exact_seconds().is_none();
                        let start = walk_n(&stop, &step, n - 1, false, config)?;
                        (start, Some(stop), Some(step))
                    }
                    (None, Some(step)) => {
                        anchor_at_stop = step.exact_seconds().is_none();
                        // Align the start bound onto the grid anchored at the
                        // end point. Nominal grids realize it during snapping,
                        // walking down from the anchor.
                        let start = match step.exact_seconds() {
                            Some(0) => stop.clone(),
                            Some(secs) => {
                                let span = (stop.time - context_start.time).num_seconds();
                                let rem = span.rem_euclid(secs);
                                point_from_epoch(context_start.epoch() + rem, config)?
                            }
                            None => context_start.clone().min(stop.clone()),
                        };
                        (start, Some(stop), Some(step))
                    }
                }
            }
        };

        // Bounds cloned from a context point still carry its raw parse
        // string; navigation hands bounds back, so canonicalize here.
        Ok(Self {
            value: value.to_string(),
            config: *config,
            step,
            anchor_at_stop,
            start: start.standardise(),
            stop: stop.map(PointOps::standardise),
            offset: IsoInterval::get_null(),
            exclusions: None,
            context_start: context_start.clone(),
            context_stop: context_stop.cloned(),
            caches: Mutex::new(NavCaches::new()),
        })
    }

    fn grid(&self) -> Grid {
        match &self.step {
            None => Grid::OneOff,
            Some(step) => match step.exact_seconds() {
                Some(0) => Grid::Degenerate,
                Some(secs) => Grid::Exact { step: secs },
                None if self.anchor_at_stop => Grid::NominalDown,
                None => Grid::NominalUp,
            },
        }
    }

    /// Move the resolved bounds back inside the context window, staying on
    /// the grid.
    fn snap_into_context(&mut self) -> Result<(), CyclingError> {
        match self.grid() {
            Grid::OneOff | Grid::Degenerate => Ok(()),
            Grid::Exact { step } => {
                if self.start < self.context_start {
                    let gap = (self.context_start.time - self.start.time).num_seconds();
                    let rem = gap.rem_euclid(step);
                    let bump = if rem > 0 { step - rem } else { 0 };
                    self.start =
                        point_from_epoch(self.start.epoch() + gap + bump, &self.config)?;
                }
                if let (Some(stop), Some(context_stop)) = (&self.stop, &self.context_stop) {
                    if stop > context_stop {
                        self.stop = Some(context_stop.clone());
                    }
                }
                // The stop bound itself sits on the grid; a raw window edge
                // or an unevenly divided span steps down to the last hit.
                if let Some(stop_epoch) = self.stop.as_ref().map(IsoPoint::epoch) {
                    let rem = (stop_epoch - self.start.epoch()).rem_euclid(step);
                    if rem > 0 {
                        self.stop = Some(point_from_epoch(stop_epoch - rem, &self.config)?);
                    }
                }
                Ok(())
            }
            Grid::NominalUp => {
                let step = self.step_or_null();
                let mut hops = 0;
                while self.start < self.context_start {
                    if hops >= NOMINAL_WALK_LIMIT {
                        return Err(self.walk_limit_error());
                    }
                    hops += 1;
                    self.start = walk_n(&self.start, &step, 1, true, &self.config)?;
                }
                if let (Some(stop), Some(context_stop)) = (&self.stop, &self.context_stop) {
                    if stop > context_stop {
                        self.stop = Some(context_stop.clone());
                    }
                }
                // Realize the stop bound as the last walked point at or
                // below the raw bound. An empty window keeps its raw stop
                // below the start.
                if let Some(stop) = self.stop.clone() {
                    let mut cursor = self.start.clone();
                    let mut last = None;
                    for _ in 0..NOMINAL_WALK_LIMIT {
                        if cursor > stop {
                            break;
                        }
                        last = Some(cursor.clone());
                        cursor = walk_n(&cursor, &step, 1, true, &self.config)?;
                    }
                    if let Some(last) = last {
                        self.stop = Some(last);
                    }
                }
                Ok(())
            }
            Grid::NominalDown => {
                let step = self.step_or_null();
                if let (Some(stop), Some(context_stop)) =
                    (self.stop.clone(), self.context_stop.clone())
                {
                    if stop > context_stop {
                        let mut cursor = stop;
                        for _ in 0..NOMINAL_WALK_LIMIT {
                            if cursor <= context_stop {
                                break;
                            }
                            cursor = walk_n(&cursor, &step, 1, false, &self.config)?;
                        }
                        self.stop = Some(cursor);
                    }
                }
                // Realize the start bound: the lowest grid point not below
                // the floor.
                let floor = self.context_start.clone().max(self.start.clone());
                if let Some(stop) = self.stop.clone() {
                    let mut cursor = stop;
                    for _ in 0..NOMINAL_WALK_LIMIT {
                        let lower = walk_n(&cursor, &step, 1, false, &self.config)?;
                        if lower < floor {
                            break;
                        }
                        cursor = lower;
                    }
                    self.start = cursor;
                }
                Ok(())
            }
        }
    }

    fn step_or_null(&self) -> IsoInterval {
        self.step.unwrap_or_else(IsoInterval::get_null)
    }

    fn in_bounds(&self, point: &IsoPoint) -> bool {
        *point >= self.start
            && self
                .stop
                .as_ref()
                .map_or(true, |stop| point <= stop)
    }

    fn is_excluded(&self, point: &IsoPoint) -> bool {
        self.exclusions.as_ref().is_some_and(|e| e.contains(point))
    }

    fn degenerate_at(&self, point: &IsoPoint) -> CyclingError {
        CyclingError::SequenceDegenerate {
            expr: self.value.clone(),
            point: point.to_string(),
        }
    }

    fn exclusion_limit_at(&self, point: &IsoPoint) -> CyclingError {
        CyclingError::ExclusionLimit {
            expr: self.value.clone(),
            point: point.to_string(),
            limit: EXCLUSION_SCAN_LIMIT,
        }
    }

    fn walk_limit_error(&self) -> CyclingError {
        CyclingError::TimeOutOfRange {
            operation: format!("calendar walk over recurrence {:?}", self.value),
        }
    }

    /// Express a one-off recurrence at the given point, or at the context
    /// start when no point is given.
    pub fn get_async_expr(point: Option<&IsoPoint>) -> String {
        match point {
            Some(point) => format!("R1/{point}"),
            None => "R1".to_string(),
        }
    }

    pub fn step(&self) -> Option<IsoInterval> {
        self.step
    }

    pub fn exclusions(&self) -> Option<&IsoExclusions> {
        self.exclusions.as_ref()
    }

    pub fn accumulated_offset(&self) -> IsoInterval {
        self.offset
    }

    /// Membership on the step grid, ignoring window bounds.
    fn on_grid(&self, point: &IsoPoint) -> bool {
        match self.grid() {
            Grid::OneOff | Grid::Degenerate => point == &self.start,
            Grid::Exact { step } => (point.epoch() - self.start.epoch()).rem_euclid(step) == 0,
            Grid::NominalUp => {
                let step = self.step_or_null();
                let mut cursor = self.start.clone();
                for _ in 0..NOMINAL_WALK_LIMIT {
                    if cursor == *point {
                        return true;
                    }
                    if cursor > *point {
                        return false;
                    }
                    match walk_n(&cursor, &step, 1, true, &self.config) {
                        Ok(next) => cursor = next,
                        Err(_) => return false,
                    }
                }
                false
            }
            Grid::NominalDown => {
                let step = self.step_or_null();
                let Some(stop) = self.stop.clone() else {
                    return false;
                };
                let mut cursor = stop;
                for _ in 0..NOMINAL_WALK_LIMIT {
                    if cursor == *point {
                        return true;
                    }
                    if cursor < *point {
                        return false;
                    }
                    match walk_n(&cursor, &step, 1, false, &self.config) {
                        Ok(prev) => cursor = prev,
                        Err(_) => return false,
                    }
                }
                false
            }
        }
    }

    fn get_next_point_uncached(
        &self,
        point: &IsoPoint,
    ) -> Result<Option<IsoPoint>, CyclingError> {
        match self.grid() {
            Grid::OneOff => {
                let start = self.start.clone();
                Ok((*point < start && !self.is_excluded(&start)).then_some(start))
            }
            Grid::Degenerate => Err(self.degenerate_at(point)),
            Grid::Exact { step } => {
                let start_epoch = self.start.epoch();
                let mut epoch = if *point < self.start {
                    start_epoch
                } else {
                    let rem = (point.epoch() - start_epoch).rem_euclid(step);
                    point.epoch() + step - rem
                };
                for _ in 0..EXCLUSION_SCAN_LIMIT {
                    let candidate = point_from_epoch(epoch, &self.config)?;
                    if !self.in_bounds(&candidate) {
                        return Ok(None);
                    }
                    if !self.is_excluded(&candidate) {
                        return Ok(Some(candidate));
                    }
                    epoch += step;
                }
                Err(self.exclusion_limit_at(point))
            }
            Grid::NominalUp => {
                let step = self.step_or_null();
                let mut cursor = self.start.clone();
                for _ in 0..NOMINAL_WALK_LIMIT {
                    if cursor > *point {
                        if !self.in_bounds(&cursor) {
                            return Ok(None);
                        }
                        if !self.is_excluded(&cursor) {
                            return Ok(Some(cursor));
                        }
                    }
                    cursor = walk_n(&cursor, &step, 1, true, &self.config)?;
                }
                Err(self.walk_limit_error())
            }
            Grid::NominalDown => {
                let step = self.step_or_null();
                let Some(stop) = self.stop.clone() else {
                    return Ok(None);
                };
                let mut cursor = stop;
                let mut best = None;
                for _ in 0..NOMINAL_WALK_LIMIT {
                    if cursor < self.start || cursor <= *point {
                        return Ok(best);
                    }
                    if !self.is_excluded(&cursor) {
                        best = Some(cursor.clone());
                    }
                    cursor = walk_n(&cursor, &step, 1, false, &self.config)?;
                }
                Err(self.walk_limit_error())
            }
        }
    }
}

/// Advance (or retreat) a point by `count` repetitions of a step. Exact
/// steps shift once; nominal steps walk the calendar so month-end
/// clamping accumulates the same way iteration does.
fn walk_n(
    from: &IsoPoint,
    step: &IsoInterval,
    count: i64,
    forward: bool,
    config: &IsoConfig,
) -> Result<IsoPoint, CyclingError> {
    let signed = if forward { 1 } else { -1 };
    if let Some(secs) = step.exact_seconds() {
        let time = isotime::shift(&from.time(), 0, 0, secs.saturating_mul(count) * signed)?;
        return Ok(IsoPoint::from_time(time, config));
    }
    if count > NOMINAL_WALK_LIMIT as i64 {
        return Err(CyclingError::TimeOutOfRange {
            operation: format!("{count} nominal steps"),
        });
    }
    let (months, days, seconds) = step.shift_parts();
    let mut time = from.time();
    for _ in 0..count {
        time = isotime::shift(&time, months * signed, days * signed, seconds * signed)?;
    }
    Ok(IsoPoint::from_time(time, config))
}

fn point_from_epoch(epoch: i64, config: &IsoConfig) -> Result<IsoPoint, CyclingError> {
    let utc = DateTime::from_timestamp(epoch, 0).ok_or_else(|| CyclingError::TimeOutOfRange {
        operation: format!("epoch second {epoch}"),
    })?;
    let offset = config
        .time_zone
        .to_fixed_offset()
        .unwrap_or_else(|_| utc.fixed_offset().offset().to_owned());
    Ok(IsoPoint::from_time(utc.with_timezone(&offset), config))
}

impl Clone for IsoSequence {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            config: self.config,
            step: self.step,
            anchor_at_stop: self.anchor_at_stop,
            start: self.start.clone(),
            stop: self.stop.clone(),
            offset: self.offset,
            exclusions: self.exclusions.clone(),
            context_start: self.context_start.clone(),
            context_stop: self.context_stop.clone(),
            caches: Mutex::new(NavCaches::new()),
        }
    }
}

impl PartialEq for IsoSequence {
    fn eq(&self, other: &Self) -> bool {
        self.step == other.step
            && self.start == other.start
            && self.stop == other.stop
            && self.exclusions == other.exclusions
    }
}

impl Eq for IsoSequence {}

impl Hash for IsoSequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.step.hash(state);
        self.start.hash(state);
        self.stop.hash(state);
        self.exclusions.hash(state);
    }
}

impl fmt::Display for IsoSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl SequenceOps for IsoSequence {
    type Point = IsoPoint;

    fn is_on_sequence(&self, point: &IsoPoint) -> bool {
        !self.is_excluded(point) && self.on_grid(point)
    }

    fn is_valid(&self, point: &IsoPoint) -> bool {
        let key = point.epoch();
        if let Some(hit) = self.caches.lock().valid.get(&key) {
            return hit;
        }
        let result = self.is_on_sequence(point) && self.in_bounds(point);
        self.caches.lock().valid.insert(key, result);
        result
    }

    fn get_prev_point(&self, point: &IsoPoint) -> Result<Option<IsoPoint>, CyclingError> {
        match self.grid() {
            Grid::OneOff => Ok(None),
            Grid::Degenerate => Err(self.degenerate_at(point)),
            Grid::Exact { step } => {
                let start_epoch = self.start.epoch();
                let mut epoch = point.epoch();
                for _ in 0..EXCLUSION_SCAN_LIMIT {
                    let rem = (epoch - start_epoch).rem_euclid(step);
                    let prev_epoch = if rem > 0 { epoch - rem } else { epoch - step };
                    let prev = point_from_epoch(prev_epoch, &self.config)?;
                    if self.is_excluded(&prev) {
                        epoch = prev_epoch;
                        continue;
                    }
                    return Ok(self.in_bounds(&prev).then_some(prev));
                }
                Err(self.exclusion_limit_at(point))
            }
            Grid::NominalUp => {
                let step = self.step_or_null();
                let mut cursor = self.start.clone();
                let mut best = None;
                for _ in 0..NOMINAL_WALK_LIMIT {
                    if cursor >= *point || !self.in_bounds(&cursor) {
                        return Ok(best);
                    }
                    if !self.is_excluded(&cursor) {
                        best = Some(cursor.clone());
                    }
                    cursor = walk_n(&cursor, &step, 1, true, &self.config)?;
                }
                Err(self.walk_limit_error())
            }
            Grid::NominalDown => {
                let step = self.step_or_null();
                let Some(stop) = self.stop.clone() else {
                    return Ok(None);
                };
                let mut cursor = stop;
                for _ in 0..NOMINAL_WALK_LIMIT {
                    if cursor < self.start {
                        return Ok(None);
                    }
                    if cursor < *point && !self.is_excluded(&cursor) {
                        return Ok(Some(cursor));
                    }
                    cursor = walk_n(&cursor, &step, 1, false, &self.config)?;
                }
                Err(self.walk_limit_error())
            }
        }
    }

    fn get_nearest_prev_point(
        &self,
        point: &IsoPoint,
    ) -> Result<Option<IsoPoint>, CyclingError> {
        // The largest on-sequence point at or below the query is the query
        // itself whenever that is a valid point.
        if self.is_valid(point) {
            return Ok(Some(IsoPoint::from_time(point.time(), &self.config)));
        }
        match self.grid() {
            Grid::OneOff | Grid::Degenerate => {
                let start = self.start.clone();
                Ok((start < *point && !self.is_excluded(&start)).then_some(start))
            }
            Grid::Exact { step } => {
                let start_epoch = self.start.epoch();
                let rem = (point.epoch() - start_epoch).rem_euclid(step);
                let mut epoch = if rem > 0 {
                    point.epoch() - rem
                } else {
                    point.epoch() - step
                };
                if let Some(stop) = &self.stop {
                    if epoch > stop.epoch() {
                        let stop_rem = (stop.epoch() - start_epoch).rem_euclid(step);
                        epoch = stop.epoch() - stop_rem;
                    }
                }
                for _ in 0..EXCLUSION_SCAN_LIMIT {
                    if epoch < start_epoch {
                        return Ok(None);
                    }
                    let candidate = point_from_epoch(epoch, &self.config)?;
                    if !self.is_excluded(&candidate) {
                        return Ok(Some(candidate));
                    }
                    epoch -= step;
                }
                Err(self.exclusion_limit_at(point))
            }
            Grid::NominalUp => {
                let step = self.step_or_null();
                let mut cursor = self.start.clone();
                let mut best = None;
                for _ in 0..NOMINAL_WALK_LIMIT {
                    if cursor >= *point || !self.in_bounds(&cursor) {
                        return Ok(best);
                    }
                    if !self.is_excluded(&cursor) {
                        best = Some(cursor.clone());
                    }
                    cursor = walk_n(&cursor, &step, 1, true, &self.config)?;
                }
                Err(self.walk_limit_error())
            }
            Grid::NominalDown => self.get_prev_point(point),
        }
    }

    fn get_next_point(&self, point: &IsoPoint) -> Result<Option<IsoPoint>, CyclingError> {
        let key = point.epoch();
        if let Some(hit) = self.caches.lock().next.get(&key) {
            return Ok(hit);
        }
        let result = self.get_next_point_uncached(point)?;
        self.caches.lock().next.insert(key, result.clone());
        Ok(result)
    }

    fn get_next_point_on_sequence(
        &self,
        point: &IsoPoint,
    ) -> Result<Option<IsoPoint>, CyclingError> {
        match self.grid() {
            Grid::OneOff => Ok(None),
            Grid::Degenerate => Err(self.degenerate_at(point)),
            Grid::Exact { step } => {
                let mut epoch = point.epoch() + step;
                for _ in 0..EXCLUSION_SCAN_LIMIT {
                    let candidate = point_from_epoch(epoch, &self.config)?;
                    if candidate == *point {
                        return Err(self.degenerate_at(point));
                    }
                    if !self.in_bounds(&candidate) {
                        return Ok(None);
                    }
                    if !self.is_excluded(&candidate) {
                        return Ok(Some(candidate));
                    }
                    epoch += step;
                }
                Err(self.exclusion_limit_at(point))
            }
            Grid::NominalUp => {
                let step = self.step_or_null();
                let mut cursor = walk_n(point, &step, 1, true, &self.config)?;
                if cursor == *point {
                    return Err(self.degenerate_at(point));
                }
                for _ in 0..EXCLUSION_SCAN_LIMIT {
                    if !self.in_bounds(&cursor) {
                        return Ok(None);
                    }
                    if !self.is_excluded(&cursor) {
                        return Ok(Some(cursor));
                    }
                    cursor = walk_n(&cursor, &step, 1, true, &self.config)?;
                }
                Err(self.exclusion_limit_at(point))
            }
            // End-anchored grids are only enumerable from the stop point.
            Grid::NominalDown => self.get_next_point_uncached(point),
        }
    }

    fn get_first_point(&self, point: &IsoPoint) -> Result<Option<IsoPoint>, CyclingError> {
        match self.grid() {
            Grid::OneOff | Grid::Degenerate => {
                let start = self.start.clone();
                Ok((start >= *point && !self.is_excluded(&start)).then_some(start))
            }
            Grid::Exact { step } => {
                let start_epoch = self.start.epoch();
                let mut epoch = if *point <= self.start {
                    start_epoch
                } else {
                    let rem = (point.epoch() - start_epoch).rem_euclid(step);
                    if rem == 0 {
                        point.epoch()
                    } else {
                        point.epoch() + step - rem
                    }
                };
                for _ in 0..EXCLUSION_SCAN_LIMIT {
                    let candidate = point_from_epoch(epoch, &self.config)?;
                    if !self.in_bounds(&candidate) {
                        return Ok(None);
                    }
                    if !self.is_excluded(&candidate) {
                        return Ok(Some(candidate));
                    }
                    epoch += step;
                }
                Err(self.exclusion_limit_at(point))
            }
            Grid::NominalUp => {
                let step = self.step_or_null();
                let mut cursor = self.start.clone();
                for _ in 0..NOMINAL_WALK_LIMIT {
                    if cursor >= *point {
                        if !self.in_bounds(&cursor) {
                            return Ok(None);
                        }
                        if !self.is_excluded(&cursor) {
                            return Ok(Some(cursor));
                        }
                    }
                    cursor = walk_n(&cursor, &step, 1, true, &self.config)?;
                }
                Err(self.walk_limit_error())
            }
            Grid::NominalDown => {
                let step = self.step_or_null();
                let Some(stop) = self.stop.clone() else {
                    return Ok(None);
                };
                let mut cursor = stop;
                let mut best = None;
                for _ in 0..NOMINAL_WALK_LIMIT {
                    if cursor < self.start || cursor < *point {
                        return Ok(best);
                    }
                    if !self.is_excluded(&cursor) {
                        best = Some(cursor.clone());
                    }
                    cursor = walk_n(&cursor, &step, 1, false, &self.config)?;
                }
                Err(self.walk_limit_error())
            }
        }
    }

    fn get_start_point(&self) -> Result<Option<IsoPoint>, CyclingError> {
        if !self.is_excluded(&self.start) {
            return Ok(Some(self.start.clone()));
        }
        self.get_next_point(&self.start)
    }

    fn get_stop_point(&self) -> Result<Option<IsoPoint>, CyclingError> {
        let Some(stop) = self.stop.clone() else {
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
    fn set_offset(&mut self, offset: &IsoInterval) -> Result<(), CyclingError> {
        if offset.is_null() {
            return Ok(());
        }
        self.offset = self.offset.add(offset)?;
        self.start = self.start.add(offset)?;
        if let Some(stop) = &self.stop {
            self.stop = Some(stop.add(offset)?);
        }
        self.snap_into_context()?;
        *self.caches.lock() = NavCaches::new();
        Ok(())
    }
}

#[cfg(test)]
#[path = "iso8601_tests.rs"]
mod tests;
