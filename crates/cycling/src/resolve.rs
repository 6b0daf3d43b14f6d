// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context-relative point expression resolution
//!
//! Beyond complete date-times, a point slot may hold `now`, a truncated
//! form projected onto the context point, `previous(...)`/`next(...)`
//! selectors over semicolon-separated candidates, a `min(...)` over
//! nested expressions, and any of these followed by a chain of signed
//! duration offsets. Everything resolves down to a concrete instant here.

use chrono::{DateTime, FixedOffset};

use crate::config::IsoConfig;
use crate::error::CyclingError;
use crate::iso8601::IsoInterval;
use crate::isotime::{self, TruncatedFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Previous,
    Next,
}

// Attempts at matching a truncated point against successive carry periods.
// Covers the longest real gap (leap-day years across a skipped century).
const TRUNCATED_MATCH_ATTEMPTS: usize = 16;

fn point_error(value: &str) -> CyclingError {
    CyclingError::PointParsing {
        point_type: crate::isotime::ISO_TYPE,
        value: value.to_string(),
    }
}

/// Resolve a point expression to a concrete instant.
pub(crate) fn resolve_expr(
    expr: &str,
    context: Option<&DateTime<FixedOffset>>,
    config: &IsoConfig,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    let cleaned: String = expr.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(point_error(expr));
    }
    resolve_cleaned(&cleaned, context, config)
}

fn resolve_cleaned(
    expr: &str,
    context: Option<&DateTime<FixedOffset>>,
    config: &IsoConfig,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    for (prefix, direction) in [
        ("previous(", Direction::Previous),
        ("next(", Direction::Next),
    ] {
        if let Some(rest) = expr.strip_prefix(prefix) {
            let (inner, tail) = split_matching_paren(rest).ok_or_else(|| point_error(expr))?;
            let base = resolve_adjacent(inner, direction, context, config)?;
            return apply_offsets(base, tail);
        }
    }
    if let Some(rest) = expr.strip_prefix("min(") {
        let (inner, tail) = split_matching_paren(rest).ok_or_else(|| point_error(expr))?;
        let mut earliest: Option<DateTime<FixedOffset>> = None;
        for arg in split_top_level_commas(inner) {
            let resolved = resolve_cleaned(arg, context, config)?;
            earliest = Some(match earliest {
                Some(best) => best.min(resolved),
                None => resolved,
            });
        }
        let base = earliest.ok_or_else(|| point_error(expr))?;
        return apply_offsets(base, tail);
    }

    let (base_str, tail) = split_offsets(expr);
    // An offset chain may stand on its own; a fully empty expression may
    // not, even where an outer `min(...)` supplies it as a candidate.
    if base_str.is_empty() && tail.is_empty() {
        return Err(point_error(expr));
    }
    let base = if base_str.is_empty() || base_str == "now" {
        *context.ok_or_else(|| CyclingError::MissingContextPoint {
            value: expr.to_string(),
        })?
    } else if let Ok(parsed) = isotime::parse_point(base_str, config) {
        parsed
    } else {
        let fields = isotime::parse_truncated(base_str)?;
        let now = context.ok_or_else(|| CyclingError::MissingContextPoint {
            value: expr.to_string(),
        })?;
        resolve_truncated(&fields, now, Direction::Next, config)?
    };
    apply_offsets(base, tail)
}

/// Resolve the candidate list of a `previous(...)`/`next(...)` selector:
/// nearest-on-that-side combination per candidate, then the earliest
/// (`next`) or latest (`previous`) across candidates.
fn resolve_adjacent(
    inner: &str,
    direction: Direction,
    context: Option<&DateTime<FixedOffset>>,
    config: &IsoConfig,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    let now = context.ok_or_else(|| CyclingError::MissingContextPoint {
        value: inner.to_string(),
    })?;
    let mut best: Option<DateTime<FixedOffset>> = None;
    for candidate in inner.split(';') {
        if candidate.is_empty() {
            return Err(point_error(inner));
        }
        let resolved = match isotime::parse_truncated(candidate) {
            Ok(fields) => resolve_truncated(&fields, now, direction, config)?,
            Err(_) => isotime::parse_point(candidate, config)?,
        };
        best = Some(match (best, direction) {
            (None, _) => resolved,
            (Some(b), Direction::Next) => b.min(resolved),
            (Some(b), Direction::Previous) => b.max(resolved),
        });
    }
    best.ok_or_else(|| point_error(inner))
}

/// Project truncated fields onto the context, stepping by the carry unit
/// until the combined point lands on the requested side. The context point
/// itself is accepted for both directions.
fn resolve_truncated(
    fields: &TruncatedFields,
    now: &DateTime<FixedOffset>,
    direction: Direction,
    config: &IsoConfig,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    let carry = fields.carry();
    let forward = direction == Direction::Next;
    let mut cursor = *now;
    for _ in 0..TRUNCATED_MATCH_ATTEMPTS {
        match isotime::combine(fields, &cursor, config) {
            Ok(combined)
                if (forward && combined >= *now) || (!forward && combined <= *now) =>
            {
                return Ok(combined);
            }
            // Wrong side of the context, or no such date in this period
            // (e.g. day 31 in February): step one carry period and retry.
            Ok(_) | Err(_) => cursor = isotime::add_carry(&cursor, carry, forward)?,
        }
    }
    Err(CyclingError::TimeOutOfRange {
        operation: "matching a truncated point against its context".to_string(),
    })
}

/// Apply a chain of `+P...`/`-P...` offsets left to right.
fn apply_offsets(
    base: DateTime<FixedOffset>,
    tail: &str,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    if tail.is_empty() {
        return Ok(base);
    }
    let mut out = base;
    for segment in split_offset_segments(tail)? {
        let interval = IsoInterval::parse(segment)?;
        let (months, days, seconds) = interval.shift_parts();
        out = isotime::shift(&out, months, days, seconds)?;
    }
    Ok(out)
}

/// Split an expression into its base and the trailing offset chain. An
/// offset always begins with a sign directly followed by `P`, which never
/// occurs inside a point token.
fn split_offsets(expr: &str) -> (&str, &str) {
    let bytes = expr.as_bytes();
    for idx in 0..bytes.len() {
        if (bytes[idx] == b'+' || bytes[idx] == b'-') && bytes.get(idx + 1) == Some(&b'P') {
            return (&expr[..idx], &expr[idx..]);
        }
    }
    (expr, "")
}

/// Cut a signed-offset chain into `±P...` segments.
fn split_offset_segments(tail: &str) -> Result<Vec<&str>, CyclingError> {
    let bytes = tail.as_bytes();
    let mut starts = Vec::new();
    for idx in 0..bytes.len() {
        if (bytes[idx] == b'+' || bytes[idx] == b'-') && bytes.get(idx + 1) == Some(&b'P') {
            starts.push(idx);
        }
    }
    if starts.first() != Some(&0) {
        return Err(CyclingError::IntervalParsing {
            interval_type: crate::isotime::ISO_TYPE,
            value: tail.to_string(),
        });
    }
    let mut segments = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(tail.len());
        segments.push(&tail[start..end]);
    }
    Ok(segments)
}

/// Split off the content up to the parenthesis matching an already-open
/// one, returning the inner text and whatever follows the close.
fn split_matching_paren(s: &str) -> Option<(&str, &str)> {
    let mut depth = 1usize;
    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&s[..idx], &s[idx + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[last..idx]);
                last = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[last..]);
    parts
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
