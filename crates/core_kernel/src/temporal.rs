//! Business calendar and timezone handling
//!
//! Every tenant runs its store in a local timezone (America/Sao_Paulo by
//! default). Order cutoffs, overdue checks and quiet hours are all decided on
//! the local calendar date, never on the server clock.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

/// Default timezone for tenants that have not configured one
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Sao_Paulo;

/// Timezone wrapper for tenant jurisdictions
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timezone::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Parses an IANA timezone name such as `America/Manaus`
    pub fn parse(name: &str) -> Result<Self, TemporalError> {
        Tz::from_str(name)
            .map(Timezone)
            .map_err(|_| TemporalError::UnknownTimezone(name.to_string()))
    }

    /// Converts a UTC datetime to the local timezone
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<Tz> {
        utc.with_timezone(&self.0)
    }

    /// Local calendar date of an instant
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        self.to_local(utc).date_naive()
    }

    /// Local wall-clock time of an instant
    pub fn local_time(&self, utc: DateTime<Utc>) -> NaiveTime {
        self.to_local(utc).time()
    }

    /// Converts a local wall-clock moment to UTC
    ///
    /// Ambiguous instants resolve to the earliest mapping; instants skipped by
    /// a DST jump are read as UTC-offset-free wall time.
    pub fn from_local(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.0.from_local_datetime(&local).earliest() {
            Some(dt) => dt.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&local),
        }
    }

    /// Gets the start of day (00:00) in this timezone as UTC
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.from_local(date.and_time(NaiveTime::MIN))
    }

    /// Gets the start of the following day in this timezone as UTC
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        match date.checked_add_days(Days::new(1)) {
            Some(next) => self.start_of_day(next),
            None => DateTime::<Utc>::MAX_UTC,
        }
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(DEFAULT_TIMEZONE)
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: start {start} must not be after end {end}")]
    InvalidPeriod {
        start: String,
        end: String,
    },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// An inclusive range of calendar dates (closing periods, reports)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TemporalError> {
        if start > end {
            return Err(TemporalError::InvalidPeriod {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// A single day
    pub fn day(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    /// The whole calendar month
    pub fn month(year: i32, month: u32) -> Result<Self, TemporalError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| TemporalError::InvalidDate(format!("{year}-{month:02}")))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| TemporalError::InvalidDate(format!("{year}-{month:02}")))?;
        let end = next.pred_opt().unwrap_or(start);
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Number of days in the range, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Which days a store delivers and collects on
///
/// Food distributors usually run Monday to Saturday, so Sunday is closed by
/// default. National and municipal holidays are registered per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessCalendar {
    pub timezone: Timezone,
    pub closed_weekdays: Vec<Weekday>,
    pub holidays: BTreeSet<NaiveDate>,
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self {
            timezone: Timezone::default(),
            closed_weekdays: vec![Weekday::Sun],
            holidays: BTreeSet::new(),
        }
    }
}

impl BusinessCalendar {
    pub fn new(timezone: Timezone) -> Self {
        Self {
            timezone,
            ..Default::default()
        }
    }

    /// Registers a holiday
    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.insert(date);
        self
    }

    /// Replaces the closed weekdays
    pub fn with_closed_weekdays(mut self, days: Vec<Weekday>) -> Self {
        self.closed_weekdays = days;
        self
    }

    /// Today's date in the tenant's timezone
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.timezone.local_date(now)
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !self.closed_weekdays.contains(&date.weekday()) && !self.holidays.contains(&date)
    }

    /// First business day strictly after `date`
    pub fn next_business_day(&self, date: NaiveDate) -> NaiveDate {
        let mut candidate = date.succ_opt().unwrap_or(date);
        // A calendar with every weekday closed would spin forever
        for _ in 0..366 {
            if self.is_business_day(candidate) {
                return candidate;
            }
            candidate = candidate.succ_opt().unwrap_or(candidate);
        }
        candidate
    }

    /// Adds `n` business days; `n == 0` rolls a closed day forward
    pub fn add_business_days(&self, date: NaiveDate, n: u32) -> NaiveDate {
        if n == 0 {
            return if self.is_business_day(date) {
                date
            } else {
                self.next_business_day(date)
            };
        }
        (0..n).fold(date, |d, _| self.next_business_day(d))
    }

    /// Moves a due date that falls on a closed day to the next business day
    pub fn adjust_due_date(&self, date: NaiveDate) -> NaiveDate {
        self.add_business_days(date, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        let tz = Timezone::default();
        // 02:00 UTC is still the previous evening in Sao Paulo (UTC-3)
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 2, 0, 0).unwrap();
        assert_eq!(tz.local_date(instant), date(2024, 3, 14));
    }

    #[test]
    fn test_month_range() {
        let feb = DateRange::month(2024, 2).unwrap();
        assert_eq!(feb.end, date(2024, 2, 29));
        assert_eq!(feb.days(), 29);

        let dec = DateRange::month(2024, 12).unwrap();
        assert_eq!(dec.end, date(2024, 12, 31));
    }

    #[test]
    fn test_next_business_day_skips_sunday_and_holiday() {
        let calendar = BusinessCalendar::default().with_holiday(date(2024, 4, 22));
        // Saturday -> Monday is a holiday -> Tuesday
        assert_eq!(calendar.next_business_day(date(2024, 4, 20)), date(2024, 4, 23));
    }

    #[test]
    fn test_invalid_range() {
        assert!(DateRange::new(date(2024, 2, 2), date(2024, 2, 1)).is_err());
    }
}
