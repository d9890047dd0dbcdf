//! Timestamp parsing and calendar-day helpers.
//!
//! The wire format is RFC 3339. For form input we also accept a bare date
//! (`2024-05-01`, midnight UTC) and an HTML `datetime-local` value
//! (`2024-05-01T09:30`, interpreted as UTC).

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{CoreError, Result};

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Parse a timestamp in any of the accepted input formats, normalised to UTC.
pub fn parse_timestamp(input: &str) -> Result<OffsetDateTime> {
    let input = input.trim();
    if let Ok(dt) = OffsetDateTime::parse(input, &Rfc3339) {
        return Ok(dt.to_offset(UtcOffset::UTC));
    }
    if let Ok(dt) = PrimitiveDateTime::parse(
        input,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(dt.assume_utc());
    }
    if let Ok(dt) = PrimitiveDateTime::parse(
        input,
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    ) {
        return Ok(dt.assume_utc());
    }
    parse_date(input)
        .map(|date| date.midnight().assume_utc())
        .map_err(|_| CoreError::invalid_date_time(format!("'{input}' is not a valid timestamp")))
}

/// Parse a calendar date (`YYYY-MM-DD`).
pub fn parse_date(input: &str) -> Result<Date> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| CoreError::invalid_date_time(format!("'{input}' is not a valid date: {e}")))
}

/// Half-open UTC bounds `[start, end)` covering one calendar day.
pub fn day_bounds(date: Date) -> (OffsetDateTime, OffsetDateTime) {
    let start = date.midnight().assume_utc();
    (start, start + Duration::days(1))
}

/// Format a timestamp as RFC 3339, the representation used in stored documents.
pub fn format_rfc3339(dt: OffsetDateTime) -> Result<String> {
    dt.format(&Rfc3339)
        .map_err(|e| CoreError::invalid_date_time(e.to_string()))
}
