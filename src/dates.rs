//! Date-range filtering for scraped publication dates
//!
//! Sites print dates as `2026.01.15`, `2026/01/15`, `2026-01-15 조회 32` and
//! so on. Everything is normalized to `YYYY-MM-DD` before comparison, and a
//! date that cannot be parsed is never treated as inside the window.

use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ScraperError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());
static BOUND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static KOREAN_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})년\s*(\d{1,2})월").unwrap());

/// Replace `.` and `/` with `-` and trim.
pub fn normalize_separators(text: &str) -> String {
    text.replace(['.', '/'], "-").trim().to_string()
}

/// First `YYYY-MM-DD` substring of `text` (after separator normalization) as a date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let cleaned = normalize_separators(text);
    let found = ISO_DATE_RE.find(&cleaned)?;
    NaiveDate::parse_from_str(found.as_str(), DATE_FORMAT).ok()
}

/// Canonical `YYYY-MM-DD` form of the first date in `text`.
pub fn normalize_date(text: &str) -> Option<String> {
    parse_date(text).map(|d| d.format(DATE_FORMAT).to_string())
}

/// Monthly labels such as `2026년 01월` map to the first day of that month.
pub fn extract_korean_month(text: &str) -> Option<String> {
    let caps = KOREAN_MONTH_RE.captures(text)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.format(DATE_FORMAT).to_string())
}

/// Strict `YYYY-MM-DD` parse for caller-supplied bounds.
pub fn parse_bound(text: &str) -> Result<NaiveDate, ScraperError> {
    let trimmed = text.trim();
    if !BOUND_RE.is_match(trimmed) {
        return Err(ScraperError::InvalidDate(text.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| ScraperError::InvalidDate(text.to_string()))
}

/// Inclusive bound check. Missing bounds are open; unparseable text is `false`.
pub fn is_in_period(text: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    match parse_date(text) {
        Some(date) => {
            start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
        }
        None => false,
    }
}

/// What an adapter does with a list item whose date could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownDatePolicy {
    /// Drop the item.
    Reject,
    /// Keep the item; its date stays a sentinel.
    Admit,
}

/// Admission window `[start, end]`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, ScraperError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ScraperError::InvalidDateRange {
                    start: s.format(DATE_FORMAT).to_string(),
                    end: e.format(DATE_FORMAT).to_string(),
                });
            }
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ScraperError> {
        Self::new(Some(parse_bound(start)?), Some(parse_bound(end)?))
    }

    pub fn contains(&self, date_text: &str) -> bool {
        is_in_period(date_text, self.start, self.end)
    }

    /// True only for a readable date strictly older than `start`.
    pub fn is_before_start(&self, date_text: &str) -> bool {
        match (parse_date(date_text), self.start) {
            (Some(date), Some(start)) => date < start,
            _ => false,
        }
    }

    pub fn admits(&self, date_text: &str, policy: UnknownDatePolicy) -> bool {
        if parse_date(date_text).is_none() {
            return policy == UnknownDatePolicy::Admit;
        }
        self.contains(date_text)
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |d: Option<NaiveDate>| {
            d.map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "*".to_string())
        };
        write!(f, "{} ~ {}", show(self.start), show(self.end))
    }
}
