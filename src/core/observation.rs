//! Raw feed observations and the type coercion applied to them.
//!
//! Feeds deliver dates and values as whatever the upstream JSON happened to
//! contain. Everything here is lenient: a token that cannot be understood
//! becomes `None` instead of an error.

use crate::core::store::Document;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const NAIVE_TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// An observation exactly as it was read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub date: Value,
    pub value: Value,
}

impl RawObservation {
    pub fn new(date: impl Into<Value>, value: impl Into<Value>) -> Self {
        Self {
            date: date.into(),
            value: value.into(),
        }
    }

    /// Projects a stored document onto its `date` and `value` fields.
    /// Missing fields become `null`.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            date: doc.get("date").cloned().unwrap_or(Value::Null),
            value: doc.get("value").cloned().unwrap_or(Value::Null),
        }
    }

    /// Coerces both fields. Returns `None` when the date is unusable.
    pub fn coerce(&self) -> Option<Observation> {
        let date = parse_date(&self.date)?;
        Some(Observation {
            date,
            value: parse_value(&self.value),
        })
    }
}

/// An observation after coercion: a calendar date and an optional value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, value }
    }
}

/// Parses a JSON value into a calendar date in UTC.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s),
        _ => None,
    }
}

/// Parses a date or timestamp string and truncates it to a UTC calendar date.
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    parse_timestamp(trimmed).map(|ts| ts.date())
}

/// Parses a timestamp string into a naive UTC timestamp.
///
/// Strings carrying an offset (RFC 3339) are converted to UTC first; naive
/// strings are taken to already be in UTC. A bare date maps to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc).naive_utc());
    }

    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parses a JSON value into a finite float.
///
/// Numbers and numeric strings are accepted. Empty strings, the `"."`
/// missing marker, non-finite numbers and every other JSON type yield `None`.
pub fn parse_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "." {
                return None;
            }
            trimmed.parse::<f64>().ok()
        }
        _ => None,
    }?;

    parsed.is_finite().then_some(parsed)
}
