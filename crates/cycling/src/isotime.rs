// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ISO 8601 date-time tokenizing and formatting
//!
//! A hand-rolled tokenizer over chrono's calendar types. Basic and
//! extended forms are accepted with reduced precision down to a bare
//! year, plus truncated (context-relative) forms and expanded years.
//! Week-date and ordinal-date forms are not accepted. Canonical dumps
//! are basic-form `CCYYMMDDThhmm` plus a zone designator, with seconds
//! appended only when nonzero.

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta,
    TimeZone, Timelike,
};
use parking_lot::Mutex;
use std::sync::LazyLock;

use crate::cache::BoundedCache;
use crate::config::{IsoConfig, TimeZoneOffset};
use crate::error::CyclingError;

/// Flavor label used in error messages and cross-flavor sort keys.
pub const ISO_TYPE: &str = "iso8601";

/// Capacity of the full-point parse cache.
pub(crate) const PARSE_CACHE_SIZE: usize = 2048;

static PARSE_CACHE: LazyLock<Mutex<BoundedCache<(IsoConfig, String), DateTime<FixedOffset>>>> =
    LazyLock::new(|| Mutex::new(BoundedCache::new(PARSE_CACHE_SIZE)));

fn point_error(value: &str) -> CyclingError {
    CyclingError::PointParsing {
        point_type: ISO_TYPE,
        value: value.to_string(),
    }
}

/// Parse a complete (non-truncated) date-time expression, consulting the
/// bounded parse cache first.
pub(crate) fn parse_point(
    expr: &str,
    config: &IsoConfig,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    let key = (*config, expr.to_string());
    if let Some(hit) = PARSE_CACHE.lock().get(&key) {
        return Ok(hit);
    }
    let parsed = parse_point_uncached(expr, config)?;
    PARSE_CACHE.lock().insert(key, parsed);
    Ok(parsed)
}

fn parse_point_uncached(
    expr: &str,
    config: &IsoConfig,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    let (body, zone) = split_zone(expr).ok_or_else(|| point_error(expr))?;
    if body.is_empty() {
        return Err(point_error(expr));
    }
    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };
    let (year, month, day) = parse_date(date_part, config).ok_or_else(|| point_error(expr))?;
    let (hour, minute, second) = match time_part {
        Some(time) => parse_time(time).ok_or_else(|| point_error(expr))?,
        None => (0, 0, 0),
    };
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| point_error(expr))?;
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| point_error(expr))?;
    let offset = zone.unwrap_or(config.time_zone).to_fixed_offset()?;
    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
        .ok_or_else(|| point_error(expr))
}

/// Strip a trailing zone designator: `Z`, or `±hh[[:]mm]` appearing after
/// the `T` separator. Returns `None` for strings that cannot carry a zone
/// where one was found.
fn split_zone(expr: &str) -> Option<(&str, Option<TimeZoneOffset>)> {
    if let Some(body) = expr.strip_suffix('Z') {
        return Some((body, Some(TimeZoneOffset::UTC)));
    }
    let t_pos = match expr.find('T') {
        Some(pos) => pos,
        None => return Some((expr, None)),
    };
    for (idx, ch) in expr.char_indices().rev() {
        if ch != '+' && ch != '-' {
            continue;
        }
        // A sign directly after `T` belongs to a truncated form (`T-mm`,
        // `T--ss`), and signs before `T` belong to expanded years.
        if idx <= t_pos + 1 {
            break;
        }
        if ch == '-' && idx == t_pos + 2 && expr.as_bytes()[t_pos + 1] == b'-' {
            break;
        }
        let digits: String = expr[idx + 1..].chars().filter(|c| *c != ':').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let offset = match digits.len() {
            2 => parse_u32(&digits).map(|h| (h, 0)),
            4 => parse_u32(&digits[..2]).zip(parse_u32(&digits[2..])),
            _ => None,
        };
        let (hours, minutes) = offset?;
        if hours > 23 || minutes > 59 {
            return None;
        }
        let sign: i8 = if ch == '-' { -1 } else { 1 };
        return Some((
            &expr[..idx],
            Some(TimeZoneOffset::new(
                sign * hours as i8,
                sign * minutes as i8,
            )),
        ));
    }
    Some((expr, None))
}

fn parse_u32(digits: &str) -> Option<u32> {
    digits.parse().ok()
}

/// Parse a date part: `CCYY[MM[DD]]` or `CCYY[-MM[-DD]]`, with an
/// optional signed expanded year when configured. Missing fields default
/// to their minimum.
fn parse_date(date: &str, config: &IsoConfig) -> Option<(i32, u32, u32)> {
    let (sign, rest) = match date.as_bytes().first()? {
        b'+' if config.expanded_year_digits > 0 => (1i64, &date[1..]),
        b'-' if config.expanded_year_digits > 0 => (-1i64, &date[1..]),
        _ => (1, date),
    };
    if rest.contains('W') {
        // week dates are not supported
        return None;
    }
    let year_len = 4 + usize::from(config.expanded_year_digits);
    let (year_str, month, day) = if rest.contains('-') {
        let mut parts = rest.split('-');
        let year = parts.next()?;
        let month = parts.next();
        let day = parts.next();
        if parts.next().is_some() {
            return None;
        }
        if month.is_some_and(|m| m.len() != 2) || day.is_some_and(|d| d.len() != 2) {
            return None;
        }
        (
            year,
            month.map(parse_u32).unwrap_or(Some(1))?,
            day.map(parse_u32).unwrap_or(Some(1))?,
        )
    } else if rest.len() == year_len {
        (rest, 1, 1)
    } else if rest.len() == year_len + 2 {
        (&rest[..year_len], parse_u32(&rest[year_len..])?, 1)
    } else if rest.len() == year_len + 4 {
        (
            &rest[..year_len],
            parse_u32(&rest[year_len..year_len + 2])?,
            parse_u32(&rest[year_len + 2..])?,
        )
    } else {
        // anything else, including ordinal dates, is rejected
        return None;
    };
    if year_str.len() != year_len || !year_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = sign * year_str.parse::<i64>().ok()?;
    Some((i32::try_from(year).ok()?, month, day))
}

/// Parse a time part: `hh[mm[ss]]` or `hh[:mm[:ss]]`.
fn parse_time(time: &str) -> Option<(u32, u32, u32)> {
    if time.contains(':') {
        let mut parts = time.split(':');
        let hour = parts.next()?;
        let minute = parts.next();
        let second = parts.next();
        if parts.next().is_some() || hour.len() != 2 {
            return None;
        }
        if minute.is_some_and(|m| m.len() != 2) || second.is_some_and(|s| s.len() != 2) {
            return None;
        }
        return Some((
            parse_u32(hour)?,
            minute.map(parse_u32).unwrap_or(Some(0))?,
            second.map(parse_u32).unwrap_or(Some(0))?,
        ));
    }
    if !time.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match time.len() {
        2 => Some((parse_u32(time)?, 0, 0)),
        4 => Some((parse_u32(&time[..2])?, parse_u32(&time[2..])?, 0)),
        6 => Some((
            parse_u32(&time[..2])?,
            parse_u32(&time[2..4])?,
            parse_u32(&time[4..])?,
        )),
        _ => None,
    }
}

/// Render a point in canonical basic form in the configured zone.
pub(crate) fn dump_point(time: &DateTime<FixedOffset>, config: &IsoConfig) -> String {
    let offset = config
        .time_zone
        .to_fixed_offset()
        .unwrap_or_else(|_| *time.offset());
    let zoned = time.with_timezone(&offset);
    let minutes = offset.local_minus_utc() / 60;
    let designator =
        TimeZoneOffset::new((minutes / 60) as i8, (minutes % 60) as i8).designator();
    let year = if config.expanded_year_digits > 0 {
        let width = 4 + usize::from(config.expanded_year_digits);
        let sign = if zoned.year() < 0 { '-' } else { '+' };
        format!("{sign}{:0width$}", zoned.year().unsigned_abs() as u64)
    } else {
        format!("{:04}", zoned.year())
    };
    let mut out = format!(
        "{year}{:02}{:02}T{:02}{:02}",
        zoned.month(),
        zoned.day(),
        zoned.hour(),
        zoned.minute()
    );
    if zoned.second() != 0 {
        out.push_str(&format!("{:02}", zoned.second()));
    }
    out.push_str(&designator);
    out
}

/// The unit bumped when a truncated point lands on the wrong side of its
/// context point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CarryUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

/// Fields of a truncated (context-relative) date-time expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct TruncatedFields {
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
    pub zone: Option<TimeZoneOffset>,
}

impl TruncatedFields {
    pub fn carry(&self) -> CarryUnit {
        if self.month.is_some() {
            CarryUnit::Year
        } else if self.day.is_some() {
            CarryUnit::Month
        } else if self.hour.is_some() {
            CarryUnit::Day
        } else if self.minute.is_some() {
            CarryUnit::Hour
        } else {
            CarryUnit::Minute
        }
    }
}

/// Parse a truncated expression: `--MM[DD]`, `---DD`, `DDThh...`,
/// `Thh[mm[ss]]`, `T-mm` or `T--ss`, each with an optional trailing zone.
pub(crate) fn parse_truncated(expr: &str) -> Result<TruncatedFields, CyclingError> {
    let (body, zone) = split_zone(expr).ok_or_else(|| point_error(expr))?;
    let mut fields = TruncatedFields {
        zone,
        ..TruncatedFields::default()
    };
    let err = || point_error(expr);

    if let Some(day) = body.strip_prefix("---") {
        if day.len() != 2 {
            return Err(err());
        }
        fields.day = Some(parse_u32(day).ok_or_else(err)?);
        return Ok(fields);
    }
    if let Some(rest) = body.strip_prefix("--") {
        let (month, day) = match rest.len() {
            2 => (parse_u32(rest).ok_or_else(err)?, None),
            4 => (
                parse_u32(&rest[..2]).ok_or_else(err)?,
                Some(parse_u32(&rest[2..]).ok_or_else(err)?),
            ),
            5 if rest.as_bytes().get(2) == Some(&b'-') => (
                parse_u32(&rest[..2]).ok_or_else(err)?,
                Some(parse_u32(&rest[3..]).ok_or_else(err)?),
            ),
            _ => return Err(err()),
        };
        fields.month = Some(month);
        fields.day = day;
        return Ok(fields);
    }
    if let Some(time) = body.strip_prefix('T') {
        if let Some(second) = time.strip_prefix("--") {
            if second.len() != 2 {
                return Err(err());
            }
            fields.second = Some(parse_u32(second).ok_or_else(err)?);
            return Ok(fields);
        }
        if let Some(minute) = time.strip_prefix('-') {
            if minute.len() != 2 {
                return Err(err());
            }
            fields.minute = Some(parse_u32(minute).ok_or_else(err)?);
            return Ok(fields);
        }
        let (hour, minute, second) = parse_time(time).ok_or_else(err)?;
        fields.hour = Some(hour);
        fields.minute = Some(minute);
        fields.second = Some(second);
        return Ok(fields);
    }
    // day-of-month plus time, e.g. `15T0630`
    if let Some((day, time)) = body.split_once('T') {
        if day.len() != 2 {
            return Err(err());
        }
        let (hour, minute, second) = parse_time(time).ok_or_else(err)?;
        fields.day = Some(parse_u32(day).ok_or_else(err)?);
        fields.hour = Some(hour);
        fields.minute = Some(minute);
        fields.second = Some(second);
        return Ok(fields);
    }
    Err(err())
}

/// Project truncated fields onto a context point. Fields above the highest
/// given unit come from the context; fields below default to their
/// minimum. Returns an error when the projection is not a real date.
pub(crate) fn combine(
    fields: &TruncatedFields,
    context: &DateTime<FixedOffset>,
    config: &IsoConfig,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    let offset = match fields.zone {
        Some(zone) => zone.to_fixed_offset()?,
        None => config
            .time_zone
            .to_fixed_offset()
            .unwrap_or_else(|_| *context.offset()),
    };
    let local = context.with_timezone(&offset);
    let (month, day, hour, minute, second) = if fields.month.is_some() {
        (
            fields.month.unwrap_or(1),
            fields.day.unwrap_or(1),
            fields.hour.unwrap_or(0),
            fields.minute.unwrap_or(0),
            fields.second.unwrap_or(0),
        )
    } else if fields.day.is_some() {
        (
            local.month(),
            fields.day.unwrap_or(1),
            fields.hour.unwrap_or(0),
            fields.minute.unwrap_or(0),
            fields.second.unwrap_or(0),
        )
    } else if fields.hour.is_some() {
        (
            local.month(),
            local.day(),
            fields.hour.unwrap_or(0),
            fields.minute.unwrap_or(0),
            fields.second.unwrap_or(0),
        )
    } else if fields.minute.is_some() {
        (
            local.month(),
            local.day(),
            local.hour(),
            fields.minute.unwrap_or(0),
            fields.second.unwrap_or(0),
        )
    } else {
        (
            local.month(),
            local.day(),
            local.hour(),
            local.minute(),
            fields.second.unwrap_or(0),
        )
    };
    let operation = || CyclingError::TimeOutOfRange {
        operation: "truncated point projection".to_string(),
    };
    let date = NaiveDate::from_ymd_opt(local.year(), month, day).ok_or_else(operation)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(operation)?;
    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
        .ok_or_else(operation)
}

/// Step a point by one carry unit in either direction.
pub(crate) fn add_carry(
    time: &DateTime<FixedOffset>,
    unit: CarryUnit,
    forward: bool,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    let months = |n: u32| {
        if forward {
            time.checked_add_months(Months::new(n))
        } else {
            time.checked_sub_months(Months::new(n))
        }
    };
    let result = match unit {
        CarryUnit::Year => months(12),
        CarryUnit::Month => months(1),
        CarryUnit::Day => {
            if forward {
                time.checked_add_days(Days::new(1))
            } else {
                time.checked_sub_days(Days::new(1))
            }
        }
        CarryUnit::Hour => time.checked_add_signed(TimeDelta::hours(if forward {
            1
        } else {
            -1
        })),
        CarryUnit::Minute => time.checked_add_signed(TimeDelta::minutes(if forward {
            1
        } else {
            -1
        })),
    };
    result.ok_or_else(|| CyclingError::TimeOutOfRange {
        operation: "carry adjustment".to_string(),
    })
}

/// Shift a point by nominal months, then days, then exact seconds, with
/// end-of-month clamping on the nominal part.
pub(crate) fn shift(
    time: &DateTime<FixedOffset>,
    months: i64,
    days: i64,
    seconds: i64,
) -> Result<DateTime<FixedOffset>, CyclingError> {
    let range = || CyclingError::TimeOutOfRange {
        operation: format!("shift by {months} months, {days} days, {seconds} seconds"),
    };
    let month_count = u32::try_from(months.unsigned_abs()).map_err(|_| range())?;
    let mut out = if months >= 0 {
        time.checked_add_months(Months::new(month_count))
    } else {
        time.checked_sub_months(Months::new(month_count))
    }
    .ok_or_else(range)?;
    out = if days >= 0 {
        out.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        out.checked_sub_days(Days::new(days.unsigned_abs()))
    }
    .ok_or_else(range)?;
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| out.checked_add_signed(delta))
        .ok_or_else(range)
}

#[cfg(test)]
#[path = "isotime_tests.rs"]
mod tests;
