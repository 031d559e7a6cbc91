// Date parsing and trailing-window arithmetic.
//
// Stored dates are ISO text (`YYYY-MM-DD`). Lactation periods are stored as
// `"<start> ~ <end>"`. Parsing never panics; callers decide what a failure means.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const MONTH_FORMAT: &str = "%Y-%m";

/// Fixed average month length used for ages.
pub const AVERAGE_MONTH_DAYS: f64 = 30.5;

pub const PERIOD_SEPARATOR: char = '~';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("date is empty")]
    Empty,

    #[error("date '{0}' has surrounding whitespace")]
    Padded(String),

    #[error("invalid date '{value}': {source}")]
    Invalid {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodParseError {
    #[error("period '{0}' has no '~' separator")]
    MissingSeparator(String),

    #[error("invalid period end: {0}")]
    InvalidEnd(#[from] DateParseError),
}

/// Parse a `YYYY-MM-DD` date, ignoring surrounding whitespace.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DateParseError> {
    parse_date_exact(raw.trim())
}

/// Parse a `YYYY-MM-DD` date exactly as stored. Surrounding whitespace is rejected.
pub fn parse_date_exact(raw: &str) -> Result<NaiveDate, DateParseError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(DateParseError::Empty);
    }
    if value != raw {
        return Err(DateParseError::Padded(raw.to_string()));
    }

    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| DateParseError::Invalid {
        value: value.to_string(),
        source,
    })
}

/// Parse a report instant. A bare date means the end of that day.
pub fn parse_as_of(raw: &str) -> Result<NaiveDateTime, DateParseError> {
    let value = raw.trim();
    if let Ok(instant) = NaiveDateTime::parse_from_str(value, DATETIME_FORMAT) {
        return Ok(instant);
    }

    let date = parse_date(value)?;
    Ok(date.and_time(end_of_day()))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// A lactation period. Only the end date drives classification, so the start is kept as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LactationPeriod {
    pub start: String,
    pub end: NaiveDate,
}

impl LactationPeriod {
    pub fn parse(raw: &str) -> Result<Self, PeriodParseError> {
        let (start, end) = raw
            .split_once(PERIOD_SEPARATOR)
            .ok_or_else(|| PeriodParseError::MissingSeparator(raw.to_string()))?;

        Ok(LactationPeriod {
            start: start.trim().to_string(),
            end: parse_date(end)?,
        })
    }

    /// Days elapsed since the period ended. Negative when the end lies in the future.
    pub fn days_since_end(&self, today: NaiveDate) -> i64 {
        (today - self.end).num_days()
    }
}

pub fn age_in_months(birth_date: NaiveDate, today: NaiveDate) -> f64 {
    (today - birth_date).num_days() as f64 / AVERAGE_MONTH_DAYS
}

/// `date` moved back by whole calendar months, clamped to the last day of shorter months.
pub fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

pub fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_sub_signed(Duration::days(days))
        .unwrap_or(NaiveDate::MIN)
}

/// Inclusive time range ending at the report instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TrailingWindow {
    pub fn months(now: NaiveDateTime, months: u32) -> Self {
        let start = months_before(now.date(), months).and_time(now.time());
        TrailingWindow { start, end: now }
    }

    /// Bounds as `YYYY-MM-DD` text, for date columns.
    pub fn date_bounds(&self) -> (String, String) {
        (
            self.start.format(DATE_FORMAT).to_string(),
            self.end.format(DATE_FORMAT).to_string(),
        )
    }

    /// Bounds as `YYYY-MM-DD HH:MM:SS` text, for timestamp columns.
    pub fn datetime_bounds(&self) -> (String, String) {
        (
            self.start.format(DATETIME_FORMAT).to_string(),
            self.end.format(DATETIME_FORMAT).to_string(),
        )
    }
}

/// `count` consecutive `YYYY-MM` labels ending at the month of `today`, oldest first.
pub fn trailing_month_labels(today: NaiveDate, count: u32) -> Vec<String> {
    let first_of_month = today.with_day(1).unwrap_or(today);
    (0..count)
        .rev()
        .map(|back| {
            months_before(first_of_month, back)
                .format(MONTH_FORMAT)
                .to_string()
        })
        .collect()
}
