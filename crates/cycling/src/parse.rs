// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurrence expression classification
//!
//! A recurrence expression is matched against an ordered table of format
//! patterns and the first match wins. Both cycling flavors share the table
//! shape; only the point and interval token patterns differ. Slot text is
//! captured raw here and resolved against context points by the flavor
//! modules.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::CyclingError;

/// How a matched recurrence anchors its points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceKind {
    /// `Rn/START/END`: n points evenly dividing two bounds.
    Bounded,
    /// Anchored at a start point, stepping forward.
    FromStart,
    /// Anchored at an end point, counting backward.
    FromEnd,
}

/// A classified recurrence: the anchoring kind, the repetition count and
/// the raw slot text, unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceSpec {
    pub kind: RecurrenceKind,
    pub reps: Option<u64>,
    pub start: Option<String>,
    pub interval: Option<String>,
    pub end: Option<String>,
}

struct FormatRow {
    pattern: Regex,
    kind: RecurrenceKind,
}

// Token patterns. A point never contains a slash; a duration always starts
// with `P`. Integer offsets (`+P2`, `-P2`) count as points so that
// context-relative bounds classify the same way absolute ones do.
const INTEGER_POINT: &str = r"(?:[+-]P\d+|\d+)";
const INTEGER_INTERVAL: &str = r"[+-]?P\d+";
const ISO_POINT: &str = r"[^PR/][^/]*";
const ISO_INTERVAL: &str = r"P[^/]*";

// Ordering matters: more specific shapes first, and end-anchored rows with
// an interval before the bare start-point rows so `R1/P0Y` style idioms
// resolve against the final context point.
#[allow(clippy::expect_used)]
fn build_rows(point: &str, interval: &str) -> Vec<FormatRow> {
    use RecurrenceKind::{Bounded, FromEnd, FromStart};
    let rows = [
        (
            format!("^R(?P<reps>\\d+)/(?P<start>{point})/(?P<end>{point})$"),
            Bounded,
        ),
        (
            format!("^R(?P<reps>\\d+)?/(?P<start>{point})/(?P<intv>{interval})$"),
            FromStart,
        ),
        (format!("^(?P<start>{point})/(?P<intv>{interval})$"), FromStart),
        (format!("^(?P<intv>{interval})$"), FromStart),
        (
            format!("^R(?P<reps>\\d+)?/(?P<intv>{interval})/(?P<end>{point})$"),
            FromEnd,
        ),
        (format!("^(?P<intv>{interval})/(?P<end>{point})$"), FromEnd),
        (format!("^R(?P<reps>\\d+)?/(?P<intv>{interval})$"), FromEnd),
        (format!("^R(?P<reps>\\d+)/(?P<start>{point})$"), FromStart),
        (format!("^R(?P<reps>\\d+)//(?P<end>{point})$"), FromEnd),
        (format!("^R(?P<reps>\\d+)$"), FromStart),
    ];
    rows.into_iter()
        .map(|(pattern, kind)| FormatRow {
            pattern: Regex::new(&pattern).expect("constant regex pattern is valid"),
            kind,
        })
        .collect()
}

static INTEGER_ROWS: LazyLock<Vec<FormatRow>> =
    LazyLock::new(|| build_rows(INTEGER_POINT, INTEGER_INTERVAL));
static ISO_ROWS: LazyLock<Vec<FormatRow>> = LazyLock::new(|| build_rows(ISO_POINT, ISO_INTERVAL));

/// Classify an integer recurrence.
pub fn classify_integer(expr: &str) -> Result<RecurrenceSpec, CyclingError> {
    classify(expr, &INTEGER_ROWS)
}

/// Classify a date-time recurrence.
pub fn classify_iso(expr: &str) -> Result<RecurrenceSpec, CyclingError> {
    classify(expr, &ISO_ROWS)
}

fn classify(expr: &str, rows: &[FormatRow]) -> Result<RecurrenceSpec, CyclingError> {
    for row in rows {
        let Some(caps) = row.pattern.captures(expr) else {
            continue;
        };
        let reps = match caps.name("reps") {
            Some(m) => {
                let n: u64 =
                    m.as_str()
                        .parse()
                        .map_err(|_| CyclingError::SequenceParsing {
                            expr: expr.to_string(),
                            reason: format!("repeat count {:?} out of range", m.as_str()),
                        })?;
                if n == 0 {
                    return Err(CyclingError::SequenceParsing {
                        expr: expr.to_string(),
                        reason: "repeat count must be at least 1".to_string(),
                    });
                }
                Some(n)
            }
            None => None,
        };
        let slot = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        };
        let spec = RecurrenceSpec {
            kind: row.kind,
            reps,
            start: slot("start"),
            interval: slot("intv"),
            end: slot("end"),
        };
        // Bounded forms derive their step from the two bounds.
        if spec.kind != RecurrenceKind::Bounded
            && spec.interval.is_none()
            && spec.reps.is_some_and(|n| n > 1)
        {
            return Err(CyclingError::SequenceParsing {
                expr: expr.to_string(),
                reason: "a repeat count above 1 requires an interval".to_string(),
            });
        }
        return Ok(spec);
    }
    Err(CyclingError::SequenceParsing {
        expr: expr.to_string(),
        reason: "matched no recurrence format".to_string(),
    })
}

/// Split a recurrence expression into its core and its exclusion entries.
///
/// At most one `!` section is allowed. Multiple entries must be wrapped in
/// a single parenthesized, comma-separated group; a lone entry may omit the
/// parentheses. Spaces inside the group are ignored.
pub fn parse_exclusion(expr: &str) -> Result<(String, Vec<String>), CyclingError> {
    let mut parts = expr.splitn(2, '!');
    let core = parts.next().unwrap_or_default().trim().to_string();
    let Some(tail) = parts.next() else {
        return Ok((core, Vec::new()));
    };
    if tail.contains('!') {
        return Err(CyclingError::SequenceParsing {
            expr: expr.to_string(),
            reason: "only one exclusion group is allowed".to_string(),
        });
    }
    let tail = tail.trim();
    let opens = tail.matches('(').count();
    let closes = tail.matches(')').count();
    if opens != closes || opens > 1 {
        return Err(CyclingError::SequenceParsing {
            expr: expr.to_string(),
            reason: "malformed parentheses in exclusion group".to_string(),
        });
    }
    if opens == 1 && !(tail.starts_with('(') && tail.ends_with(')')) {
        return Err(CyclingError::SequenceParsing {
            expr: expr.to_string(),
            reason: "exclusion group parentheses must wrap the whole group".to_string(),
        });
    }
    if opens == 0 && tail.contains(',') {
        return Err(CyclingError::SequenceParsing {
            expr: expr.to_string(),
            reason: "multiple exclusions must be wrapped in parentheses".to_string(),
        });
    }
    let cleaned: String = tail
        .chars()
        .filter(|c| !matches!(c, ' ' | '(' | ')'))
        .collect();
    let mut entries = Vec::new();
    for entry in cleaned.split(',') {
        if entry.is_empty() {
            return Err(CyclingError::ExclusionParsing {
                value: String::new(),
            });
        }
        entries.push(entry.to_string());
    }
    Ok((core, entries))
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
