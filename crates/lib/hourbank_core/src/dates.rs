//! Calendar date helpers shared by sync, ledger and closure code.
//!
//! All dates are UTC calendar days formatted `YYYY-MM-DD`. Ranges are
//! inclusive on both ends; conversions to timestamps use the half-open
//! interval `[start 00:00Z, end+1 00:00Z)`.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Days of history pulled by a manual sync when no start date is given.
pub const DEFAULT_SYNC_LOOKBACK_DAYS: u64 = 7;

/// Days covered by a time-bank query when neither bound is given.
pub const DEFAULT_TIME_BANK_RANGE_DAYS: u64 = 30;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if end < start {
            return Err("end_date must be >= start_date".into());
        }
        Ok(Self { start, end })
    }

    /// Whether `day` lies inside the range (inclusive).
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Inclusive overlap test.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        !(other.end < self.start || other.start > self.end)
    }

    /// First instant of the range.
    pub fn start_at(&self) -> DateTime<Utc> {
        start_of_day(self.start)
    }

    /// First instant after the range.
    pub fn end_exclusive_at(&self) -> DateTime<Utc> {
        start_of_day(next_day(self.end))
    }

    /// Intersect with an optional employment window. `None` bounds are open.
    pub fn clamp(&self, from: Option<NaiveDate>, until: Option<NaiveDate>) -> Option<DateRange> {
        let start = from.map_or(self.start, |d| d.max(self.start));
        let end = until.map_or(self.end, |d| d.min(self.end));
        (start <= end).then_some(DateRange { start, end })
    }

    /// Iterate every day of the range in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Midnight UTC of `day`.
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// The calendar day after `day`, saturating at the calendar's end.
pub fn next_day(day: NaiveDate) -> NaiveDate {
    day.checked_add_days(Days::new(1)).unwrap_or(day)
}

/// `day` minus `n` days, saturating at the calendar's start.
pub fn days_before(day: NaiveDate, n: u64) -> NaiveDate {
    day.checked_sub_days(Days::new(n)).unwrap_or(day)
}

/// Parse a `YYYY-MM-DD` date (surrounding whitespace ignored).
///
/// The error message names the offending field so it can be returned to
/// the client as is.
pub fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{field} must be YYYY-MM-DD"))
}

/// Parse an optional query/body date, treating blank as absent.
pub fn parse_optional_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_date(value, field).map(Some),
        None => Ok(None),
    }
}

/// Range for a manual sync: start defaults to `today - 7`, end to `today`.
pub fn sync_range(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<DateRange, String> {
    let start = parse_optional_date(start, "start_date")?
        .unwrap_or_else(|| days_before(today, DEFAULT_SYNC_LOOKBACK_DAYS));
    let end = parse_optional_date(end, "end_date")?.unwrap_or(today);
    DateRange::new(start, end)
}

/// Range for time-bank reads.
///
/// End defaults to `today` and start to the first day of the current month.
/// When both are absent the range is the last 30 days.
pub fn time_bank_range(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<DateRange, String> {
    let start = parse_optional_date(start, "start_date")?;
    let end = parse_optional_date(end, "end_date")?;
    let range = match (start, end) {
        (None, None) => (days_before(today, DEFAULT_TIME_BANK_RANGE_DAYS), today),
        (start, end) => (
            start.unwrap_or_else(|| today.with_day0(0).unwrap_or(today)),
            end.unwrap_or(today),
        ),
    };
    DateRange::new(range.0, range.1)
}
