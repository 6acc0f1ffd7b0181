//! Text to typed column conversion.
//!
//! Converters are all-or-nothing: a column converts only when every
//! present value parses. Otherwise `None` is returned and the column
//! stays text.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}$").expect("Invalid regex: YYYY-MM-DD"),
        Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("Invalid regex: MM/DD/YYYY"),
        Regex::new(r"^\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}").expect("Invalid regex: datetime"),
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").expect("Invalid regex: ISO"),
    ]
});

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// True if `value` has the shape of a date or timestamp.
fn looks_like_datetime(value: &str) -> bool {
    let trimmed = value.trim();
    DATE_PATTERNS.iter().any(|pattern| pattern.is_match(trimmed))
}

/// Milliseconds since the epoch for a date or timestamp literal.
///
/// Offsets are converted to UTC; naive values are taken as UTC.
pub(crate) fn parse_datetime_ms(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if !looks_like_datetime(trimmed) {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc().timestamp_millis())
}

/// Parse every present value with `parse`; `None` if any fails or none
/// are present.
fn parse_all<T>(series: &Series, parse: impl Fn(&str) -> Option<T>) -> PolarsResult<Option<Vec<Option<T>>>> {
    let text = series.str()?;
    if text.len() == text.null_count() {
        return Ok(None);
    }

    let mut parsed = Vec::with_capacity(text.len());
    for value in text.into_iter() {
        match value {
            Some(v) => match parse(v) {
                Some(p) => parsed.push(Some(p)),
                None => return Ok(None),
            },
            None => parsed.push(None),
        }
    }
    Ok(Some(parsed))
}

/// Convert a text Series to `Datetime(ms)`.
pub(crate) fn string_to_datetime(series: &Series) -> PolarsResult<Option<Series>> {
    let Some(millis) = parse_all(series, parse_datetime_ms)? else {
        return Ok(None);
    };
    let converted = Series::new(series.name().clone(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    Ok(Some(converted))
}

fn parse_finite(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convert a text Series to `Int64` when every value is an integer,
/// otherwise to `Float64`.
pub(crate) fn string_to_numeric(series: &Series) -> PolarsResult<Option<Series>> {
    if let Some(integers) = parse_all(series, |v| v.trim().parse::<i64>().ok())? {
        return Ok(Some(Series::new(series.name().clone(), integers)));
    }
    let floats = parse_all(series, parse_finite)?;
    Ok(floats.map(|values| Series::new(series.name().clone(), values)))
}
