//! Quiet hours for outbound notifications

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::Timezone;

/// Local window in which automatic notifications are held back
///
/// The window may wrap midnight; the default is 20:00 to 08:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Timezone,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            timezone: Timezone::default(),
        }
    }
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime, timezone: Timezone) -> Self {
        Self { start, end, timezone }
    }

    pub fn is_quiet(&self, now: DateTime<Utc>) -> bool {
        let local = self.timezone.local_time(now);
        if self.start == self.end {
            false
        } else if self.start < self.end {
            local >= self.start && local < self.end
        } else {
            local >= self.start || local < self.end
        }
    }

    /// Earliest instant at or after `now` when a message may go out
    pub fn next_allowed(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if !self.is_quiet(now) {
            return now;
        }
        let local_date = self.timezone.local_date(now);
        let local_time = self.timezone.local_time(now);
        // Past the start of a wrapping window, the end falls on the next day
        let end_date = if self.start > self.end && local_time >= self.start {
            local_date.checked_add_days(Days::new(1)).unwrap_or(local_date)
        } else {
            local_date
        };
        self.timezone.from_local(end_date.and_time(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daytime_is_allowed() {
        let quiet = QuietHours::default();
        // 15:00 in São Paulo
        let now = Utc.with_ymd_and_hms(2024, 5, 14, 18, 0, 0).unwrap();
        assert!(!quiet.is_quiet(now));
        assert_eq!(quiet.next_allowed(now), now);
    }

    #[test]
    fn test_evening_defers_to_next_morning() {
        let quiet = QuietHours::default();
        // 21:30 local on the 14th
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 0, 30, 0).unwrap();
        assert!(quiet.is_quiet(now));
        // 08:00 local on the 15th
        assert_eq!(
            quiet.next_allowed(now),
            Utc.with_ymd_and_hms(2024, 5, 15, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_early_morning_defers_same_day() {
        let quiet = QuietHours::default();
        // 06:00 local
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 9, 0, 0).unwrap();
        assert_eq!(
            quiet.next_allowed(now),
            Utc.with_ymd_and_hms(2024, 5, 15, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_boundaries() {
        let quiet = QuietHours::default();
        // Exactly 08:00 local is allowed, exactly 20:00 is not
        assert!(!quiet.is_quiet(Utc.with_ymd_and_hms(2024, 5, 15, 11, 0, 0).unwrap()));
        assert!(quiet.is_quiet(Utc.with_ymd_and_hms(2024, 5, 15, 23, 0, 0).unwrap()));
    }
}
