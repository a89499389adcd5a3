//! Timesheet period boundaries.
//!
//! A timesheet covers the week ending on the first Sunday on or after its
//! latest activity, closing at 22:59:59 local time. Daylight-saving changes
//! are not accounted for: the offset is copied from the latest shift as-is.

use chrono::{DateTime, Datelike, Duration, NaiveDate};

use crate::error::ApiError;
use crate::types::{NewDeliverable, NewShift};

/// Period ending used when a timesheet has no dated content.
pub const EMPTY_PERIOD_ENDING: &str = "2019-12-31T22:59:59";

/// Offset used when no shift supplies one.
pub const DEFAULT_OFFSET: &str = "-05:00";

const CLOSING_TIME: &str = "22:59:59";

/// Compute the `period_ending` timestamp for a timesheet.
///
/// Dates are compared as strings: shift `time_in` values and deliverable
/// `date` values are ISO-formatted, so lexicographic order is chronological.
///
/// # Errors
///
/// Returns `ApiError::InvalidDate` if the latest date's first ten characters
/// are not a calendar date, or the latest shift's `time_in` carries no
/// parseable offset.
pub fn period_ending(shifts: &[NewShift], deliverables: &[NewDeliverable]) -> Result<String, ApiError> {
    let latest_shift = shifts.iter().map(|s| s.time_in.as_str()).max();
    let latest_deliverable = deliverables.iter().map(|d| d.date.as_str()).max();

    let latest = match (latest_shift, latest_deliverable) {
        (Some(s), Some(d)) => s.max(d),
        (Some(s), None) => s,
        (None, Some(d)) => d,
        (None, None) => return Ok(EMPTY_PERIOD_ENDING.to_string()),
    };

    let sunday = following_sunday(calendar_date(latest)?);
    let offset = match latest_shift {
        Some(time_in) => utc_offset(time_in)?,
        None => DEFAULT_OFFSET.to_string(),
    };

    Ok(format!("{}T{CLOSING_TIME}{offset}", sunday.format("%Y-%m-%d")))
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp.
fn calendar_date(value: &str) -> Result<NaiveDate, ApiError> {
    let prefix = value
        .get(..10)
        .ok_or_else(|| ApiError::InvalidDate(value.to_string()))?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").map_err(|_| ApiError::InvalidDate(value.to_string()))
}

/// First Sunday on or after `date`.
fn following_sunday(date: NaiveDate) -> NaiveDate {
    let weekday = i64::from(date.weekday().num_days_from_monday());
    if weekday == 6 {
        date
    } else {
        date + Duration::days(6 - weekday)
    }
}

/// Timestamp layouts accepted besides full RFC 3339; seconds are optional.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"];

/// `+HH:MM` / `-HH:MM` offset of an ISO-8601 timestamp. `Z` reads as `+00:00`.
fn utc_offset(timestamp: &str) -> Result<String, ApiError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(t.offset().to_string());
    }
    let normalized = match timestamp.strip_suffix(['Z', 'z']) {
        Some(local) => format!("{local}+00:00"),
        None => timestamp.to_string(),
    };
    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(&normalized, format).ok())
        .map(|t| t.offset().to_string())
        .ok_or_else(|| ApiError::InvalidDate(timestamp.to_string()))
}
