// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for cycle point, interval and recurrence handling

use thiserror::Error;

/// Errors raised while parsing or navigating cycling expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CyclingError {
    /// A point expression could not be parsed.
    #[error("invalid {point_type} cycle point: {value:?}")]
    PointParsing {
        point_type: &'static str,
        value: String,
    },

    /// An interval expression could not be parsed.
    #[error("invalid {interval_type} interval: {value:?}")]
    IntervalParsing {
        interval_type: &'static str,
        value: String,
    },

    /// A recurrence expression matched no known format, or matched one
    /// with inconsistent fields.
    #[error("invalid recurrence {expr:?}: {reason}")]
    SequenceParsing { expr: String, reason: String },

    /// A recurrence used a feature the flavor does not support.
    #[error("unsupported recurrence {expr:?}: {feature}")]
    Unsupported { expr: String, feature: String },

    /// A relative expression had no context point to resolve against.
    #[error("relative expression {value:?} has no context point to resolve against")]
    MissingContextPoint { value: String },

    /// Sequence navigation computed the same point it started from.
    #[error("degenerate recurrence {expr:?}: adjacent points are equal at {point}")]
    SequenceDegenerate { expr: String, point: String },

    /// An exclusion entry is neither a point nor a nested recurrence.
    #[error("invalid exclusion entry {value:?}")]
    ExclusionParsing { value: String },

    /// Navigation gave up after skipping too many excluded points in a row.
    #[error("recurrence {expr:?}: gave up after {limit} consecutive excluded points from {point}")]
    ExclusionLimit {
        expr: String,
        point: String,
        limit: usize,
    },

    /// Arithmetic combined nominal and exact components of opposite sign
    /// and the result has no single-sign duration form.
    #[error("cannot reduce mixed-sign duration arithmetic: {detail}")]
    IntervalArithmetic { detail: String },

    /// An operation mixed integer and date-time cycling values.
    #[error("mismatched cycling types: {left} vs {right}")]
    TypeMismatch {
        left: &'static str,
        right: &'static str,
    },

    /// Date-time arithmetic left the range the calendar backend supports.
    #[error("date-time out of range while computing {operation}")]
    TimeOutOfRange { operation: String },
}
