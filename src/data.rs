use std::{fmt, sync::OnceLock};

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single scalar from a source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Wraps a decoded CSV field; blank fields become [`Cell::Empty`].
    pub fn from_field(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Numeric reading of the cell, `None` when unparseable or missing.
    pub fn as_metric(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Number(value) => normalize_metric(*value),
            Cell::Text(text) => parse_metric(text),
        }
    }

    /// Numeric reading with the zero default used for merging and cleaning.
    pub fn metric_or_zero(&self) -> f64 {
        self.as_metric().unwrap_or(0.0)
    }

    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(value) => format_number(*value),
            Cell::Text(text) => text.trim().to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from_field(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn normalize_metric(value: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    Some(value.max(0.0))
}

/// Parses a metric as found in exports: `1,234`, `12.5%`, `3.2万`, `1.5k`.
/// Negative readings clamp to zero; non-finite readings are rejected.
pub fn parse_metric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let compact: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '\u{a0}'))
        .collect();
    let compact = compact.strip_suffix('%').unwrap_or(&compact);
    let (digits, multiplier) = if let Some(rest) = compact.strip_suffix('万') {
        (rest, 10_000.0)
    } else if let Some(rest) = compact
        .strip_suffix('w')
        .or_else(|| compact.strip_suffix('W'))
    {
        (rest, 10_000.0)
    } else if let Some(rest) = compact
        .strip_suffix('k')
        .or_else(|| compact.strip_suffix('K'))
    {
        (rest, 1_000.0)
    } else {
        (compact, 1.0)
    };
    let parsed: f64 = digits.parse().ok()?;
    normalize_metric(parsed * multiplier)
}

/// A parsed timestamp and whether the source carried a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub value: NaiveDateTime,
    pub has_time: bool,
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%Y%m%d", "%Y.%m.%d",
    ];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_local());
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

fn chinese_date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(\d{4})年(\d{1,2})月(\d{1,2})日?(?:\s*(\d{1,2})[:时](\d{1,2})(?::(\d{1,2})|分(?:(\d{1,2})秒?)?)?)?$",
            )
            .ok()
        })
        .as_ref()
}

fn parse_chinese_timestamp(value: &str) -> Option<Timestamp> {
    let captures = chinese_date_pattern()?.captures(value)?;
    let number = |idx: usize| -> Option<u32> { captures.get(idx)?.as_str().parse().ok() };
    let date = NaiveDate::from_ymd_opt(number(1)? as i32, number(2)?, number(3)?)?;
    match (number(4), number(5)) {
        (Some(hour), Some(minute)) => {
            let second = number(6).or_else(|| number(7)).unwrap_or(0);
            let time = NaiveTime::from_hms_opt(hour, minute, second)?;
            Some(Timestamp {
                value: date.and_time(time),
                has_time: true,
            })
        }
        _ => Some(Timestamp {
            value: date.and_time(NaiveTime::default()),
            has_time: false,
        }),
    }
}

/// Parses the date column of an export. Date-only values land on midnight
/// and report `has_time == false`.
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = parse_naive_datetime(trimmed) {
        return Some(Timestamp {
            value: parsed,
            has_time: true,
        });
    }
    if let Ok(parsed) = parse_naive_date(trimmed) {
        return Some(Timestamp {
            value: parsed.and_time(NaiveTime::default()),
            has_time: false,
        });
    }
    parse_chinese_timestamp(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn parse_metric_accepts_common_export_notations() {
        assert_eq!(parse_metric("1,234"), Some(1234.0));
        assert_eq!(parse_metric(" 42 "), Some(42.0));
        assert_eq!(parse_metric("12.5%"), Some(12.5));
        assert_eq!(parse_metric("3.2万"), Some(32_000.0));
        assert_eq!(parse_metric("1.5k"), Some(1_500.0));
        assert_eq!(parse_metric("2w"), Some(20_000.0));
    }

    #[test]
    fn parse_metric_rejects_garbage_and_clamps_negatives() {
        assert_eq!(parse_metric(""), None);
        assert_eq!(parse_metric("n/a"), None);
        assert_eq!(parse_metric("NaN"), None);
        assert_eq!(parse_metric("inf"), None);
        assert_eq!(parse_metric("-5"), Some(0.0));
    }

    #[test]
    fn cell_metric_defaults_to_zero() {
        assert_eq!(Cell::Empty.metric_or_zero(), 0.0);
        assert_eq!(Cell::from("abc").metric_or_zero(), 0.0);
        assert_eq!(Cell::Number(f64::NAN).metric_or_zero(), 0.0);
        assert_eq!(Cell::Number(7.0).metric_or_zero(), 7.0);
    }

    #[test]
    fn cell_text_trims_and_formats_numbers() {
        assert_eq!(Cell::from("  微博 ").as_text(), "微博");
        assert_eq!(Cell::Number(3.0).as_text(), "3");
        assert_eq!(Cell::Number(2.5).as_text(), "2.5");
        assert!(Cell::from("   ").is_empty());
    }

    #[test]
    fn parse_timestamp_supports_datetime_and_date_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        for raw in [
            "2024-05-06 14:30:00",
            "2024-05-06T14:30:00",
            "2024/05/06 14:30",
            "2024-05-06T14:30:00+08:00",
        ] {
            let parsed = parse_timestamp(raw).unwrap();
            assert_eq!(parsed.value, expected, "{raw}");
            assert!(parsed.has_time);
        }

        let date_only = parse_timestamp("2024-05-06").unwrap();
        assert!(!date_only.has_time);
        assert_eq!(date_only.value.hour(), 0);
    }

    #[test]
    fn parse_timestamp_supports_chinese_dates() {
        let parsed = parse_timestamp("2024年5月6日").unwrap();
        assert_eq!(parsed.value.date(), NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert!(!parsed.has_time);

        let with_time = parse_timestamp("2024年5月6日 20:15").unwrap();
        assert_eq!(with_time.value.hour(), 20);
        assert!(with_time.has_time);

        let written_out = parse_timestamp("2024年5月6日 20时15分").unwrap();
        assert_eq!((written_out.value.hour(), written_out.value.minute()), (20, 15));
        assert!(written_out.has_time);

        let with_seconds = parse_timestamp("2024年5月6日 20时15分30秒").unwrap();
        assert_eq!(with_seconds.value.second(), 30);
        assert_eq!(parse_timestamp("2024年5月6日 8:05:09").unwrap().value.second(), 9);
    }

    #[test]
    fn parse_timestamp_rejects_invalid_dates() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-45").is_none());
    }
}
