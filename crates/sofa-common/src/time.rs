//! Timestamp parsing for clinical extracts.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::AnyValue;

use crate::polars::any_to_string_non_empty;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Output format used for every timestamp the pipeline writes.
pub const DATETIME_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses an ISO-8601-like timestamp. A bare date means midnight.
///
/// ```
/// use sofa_common::parse_datetime;
///
/// let ts = parse_datetime("2180-07-23 14:00:00").unwrap();
/// assert_eq!(ts.to_string(), "2180-07-23 14:00:00");
/// assert!(parse_datetime("23/07/2180").is_none());
/// ```
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

pub fn any_to_datetime(value: AnyValue<'_>) -> Option<NaiveDateTime> {
    any_to_string_non_empty(value).and_then(|text| parse_datetime(&text))
}

pub fn format_datetime(value: NaiveDateTime) -> String {
    value.format(DATETIME_OUTPUT_FORMAT).to_string()
}
