// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Date-time cycling configuration
//!
//! Parsing and formatting of date-time points depends on two settings: the
//! assumed time zone for zone-less expressions and the number of expanded
//! year digits. Both live in [`IsoConfig`], which is passed explicitly to
//! every parse and dump call so two workflows with different settings can
//! coexist in one process.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::CyclingError;

/// A fixed UTC offset, stored as signed hours plus signed minutes.
///
/// Both fields carry the sign of the offset, so UTC-05:30 is
/// `{ hours: -5, minutes: -30 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeZoneOffset {
    pub hours: i8,
    pub minutes: i8,
}

impl TimeZoneOffset {
    pub const UTC: Self = Self {
        hours: 0,
        minutes: 0,
    };

    pub fn new(hours: i8, minutes: i8) -> Self {
        Self { hours, minutes }
    }

    pub fn total_minutes(&self) -> i32 {
        i32::from(self.hours) * 60 + i32::from(self.minutes)
    }

    pub fn is_utc(&self) -> bool {
        self.total_minutes() == 0
    }

    /// The equivalent chrono offset.
    pub fn to_fixed_offset(&self) -> Result<FixedOffset, CyclingError> {
        FixedOffset::east_opt(self.total_minutes() * 60).ok_or_else(|| {
            CyclingError::TimeOutOfRange {
                operation: format!("UTC offset of {} minutes", self.total_minutes()),
            }
        })
    }

    /// Render as a zone designator: `Z`, `+hhmm` or `-hhmm`.
    pub fn designator(&self) -> String {
        if self.is_utc() {
            return "Z".to_string();
        }
        let total = self.total_minutes();
        let sign = if total < 0 { '-' } else { '+' };
        let abs = total.abs();
        format!("{sign}{:02}{:02}", abs / 60, abs % 60)
    }
}

impl Default for TimeZoneOffset {
    fn default() -> Self {
        Self::UTC
    }
}

/// Settings for parsing and dumping date-time cycle points.
///
/// Threaded explicitly through the date-time flavor; there is no process-wide
/// default to mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IsoConfig {
    /// Zone assumed for expressions without a designator, and the zone
    /// canonical dumps are rendered in.
    pub time_zone: TimeZoneOffset,
    /// Extra leading year digits accepted and emitted beyond the usual four.
    /// Zero disables expanded years entirely.
    pub expanded_year_digits: u8,
}

impl IsoConfig {
    /// UTC, no expanded years. The common case.
    pub fn utc() -> Self {
        Self::default()
    }

    pub fn with_time_zone(hours: i8, minutes: i8) -> Self {
        Self {
            time_zone: TimeZoneOffset::new(hours, minutes),
            ..Self::default()
        }
    }

    pub fn with_expanded_years(digits: u8) -> Self {
        Self {
            expanded_year_digits: digits,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
