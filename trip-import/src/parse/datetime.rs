use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::types::ParsedTimestamp;

// Tried in order when no explicit format is configured. Formats carrying an
// offset come first so an explicit zone is never silently dropped.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const UTC_MARKED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S%.fZ"];

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateTimeFormat {
    Flexible,
    Exact(String),
}

impl From<Option<String>> for DateTimeFormat {
    fn from(format: Option<String>) -> Self {
        match format {
            Some(f) => DateTimeFormat::Exact(f),
            None => DateTimeFormat::Flexible,
        }
    }
}

impl DateTimeFormat {
    /// Parses an already trimmed value. The error is a message suitable for a
    /// field-level diagnostic.
    pub fn parse(&self, value: &str) -> Result<ParsedTimestamp, String> {
        match self {
            DateTimeFormat::Flexible => parse_flexible(value)
                .ok_or_else(|| format!("unrecognised date/time {value:?}")),
            DateTimeFormat::Exact(format) => parse_exact(value, format)
                .ok_or_else(|| format!("{value:?} does not match format {format:?}")),
        }
    }
}

fn parse_exact(value: &str, format: &str) -> Option<ParsedTimestamp> {
    if let Ok(with_offset) = DateTime::parse_from_str(value, format) {
        return Some(ParsedTimestamp::Utc(with_offset.with_timezone(&Utc)));
    }
    if let Ok(local) = NaiveDateTime::parse_from_str(value, format) {
        return Some(ParsedTimestamp::Unspecified(local));
    }
    NaiveDate::parse_from_str(value, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(ParsedTimestamp::Unspecified)
}

fn parse_flexible(value: &str) -> Option<ParsedTimestamp> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(ParsedTimestamp::Utc(with_offset.with_timezone(&Utc)));
    }

    for format in OFFSET_FORMATS {
        if let Ok(with_offset) = DateTime::parse_from_str(value, format) {
            return Some(ParsedTimestamp::Utc(with_offset.with_timezone(&Utc)));
        }
    }

    for format in UTC_MARKED_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ParsedTimestamp::Utc(naive.and_utc()));
        }
    }

    for format in LOCAL_FORMATS {
        if let Ok(local) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ParsedTimestamp::Unspecified(local));
        }
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc2822(value) {
        return Some(ParsedTimestamp::Utc(with_offset.with_timezone(&Utc)));
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(ParsedTimestamp::Unspecified)
}
