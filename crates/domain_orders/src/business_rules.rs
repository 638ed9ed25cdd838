//! Business-rule time windows
//!
//! All windows are evaluated on the tenant's local clock:
//! - orders placed before the cutoff are delivered on the next business day
//! - after the cutoff they slip one more business day
//! - confirmed orders can be changed until `edit_window_hours` before the
//!   delivery day starts
//! - receivables count as overdue only after the grace days have passed

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{BusinessCalendar, Money};

/// Per-tenant operating rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRules {
    pub calendar: BusinessCalendar,
    /// Local time after which orders ship one business day later
    pub order_cutoff: NaiveTime,
    /// Hours before the delivery day during which confirmed orders may change
    pub edit_window_hours: i64,
    pub business_open: NaiveTime,
    pub business_close: NaiveTime,
    /// Minimum order total for wholesale customers
    pub min_wholesale_order: Money,
    /// Deliver on the same day when ordered before the cutoff
    pub same_day_delivery: bool,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            calendar: BusinessCalendar::default(),
            order_cutoff: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or(NaiveTime::MIN),
            edit_window_hours: 12,
            business_open: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            business_close: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN),
            min_wholesale_order: Money::brl(dec!(300)),
            same_day_delivery: false,
        }
    }
}

impl BusinessRules {
    pub fn new(calendar: BusinessCalendar) -> Self {
        Self {
            calendar,
            ..Default::default()
        }
    }

    /// Delivery date for an order placed at `placed_at`
    pub fn delivery_date_for(&self, placed_at: DateTime<Utc>) -> NaiveDate {
        let tz = &self.calendar.timezone;
        let local_date = tz.local_date(placed_at);
        let before_cutoff = tz.local_time(placed_at) < self.order_cutoff
            && self.calendar.is_business_day(local_date);

        match (before_cutoff, self.same_day_delivery) {
            (true, true) => local_date,
            (true, false) => self.calendar.add_business_days(local_date, 1),
            (false, true) => self.calendar.add_business_days(local_date, 1),
            (false, false) => self.calendar.add_business_days(local_date, 2),
        }
    }

    /// Last instant at which a confirmed order for `delivery_date` may change
    pub fn edit_deadline(&self, delivery_date: NaiveDate) -> DateTime<Utc> {
        self.calendar.timezone.start_of_day(delivery_date) - Duration::hours(self.edit_window_hours)
    }

    pub fn can_edit(&self, now: DateTime<Utc>, delivery_date: NaiveDate) -> bool {
        now < self.edit_deadline(delivery_date)
    }

    /// Whether the store is open for counter sales at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let tz = &self.calendar.timezone;
        let date = tz.local_date(now);
        let time = tz.local_time(now);
        self.calendar.is_business_day(date) && time >= self.business_open && time < self.business_close
    }

    /// A due date is overdue once `today` is past it plus the grace days
    pub fn is_overdue(&self, due_date: NaiveDate, today: NaiveDate, grace_days: u32) -> bool {
        let limit = due_date
            .checked_add_days(Days::new(u64::from(grace_days)))
            .unwrap_or(NaiveDate::MAX);
        today > limit
    }

    /// Today's date in the tenant's timezone
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.calendar.local_date(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Sao Paulo is UTC-3; 13:00 UTC = 10:00 local
    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h + 3, 0, 0).unwrap()
    }

    #[test]
    fn test_before_cutoff_next_business_day() {
        let rules = BusinessRules::default();
        // Tuesday 10:00 -> Wednesday
        assert_eq!(rules.delivery_date_for(local(2024, 5, 14, 10)), date(2024, 5, 15));
    }

    #[test]
    fn test_after_cutoff_slips_a_day() {
        let rules = BusinessRules::default();
        // Tuesday 15:00 -> Thursday
        assert_eq!(rules.delivery_date_for(local(2024, 5, 14, 15)), date(2024, 5, 16));
    }

    #[test]
    fn test_sunday_order_counts_as_after_cutoff() {
        let rules = BusinessRules::default();
        // Sunday 09:00 -> Monday is the first business day, Tuesday the second
        assert_eq!(rules.delivery_date_for(local(2024, 5, 12, 9)), date(2024, 5, 14));
    }

    #[test]
    fn test_same_day_delivery() {
        let rules = BusinessRules {
            same_day_delivery: true,
            ..Default::default()
        };
        assert_eq!(rules.delivery_date_for(local(2024, 5, 14, 10)), date(2024, 5, 14));
    }

    #[test]
    fn test_edit_window() {
        let rules = BusinessRules::default();
        let delivery = date(2024, 5, 15);
        // Deadline is 12:00 local on the 14th
        assert!(rules.can_edit(local(2024, 5, 14, 11), delivery));
        assert!(!rules.can_edit(local(2024, 5, 14, 12), delivery));
    }

    #[test]
    fn test_business_hours() {
        let rules = BusinessRules::default();
        assert!(rules.is_open(local(2024, 5, 14, 7)));
        assert!(!rules.is_open(local(2024, 5, 14, 19)));
        assert!(!rules.is_open(local(2024, 5, 12, 10)));
    }

    #[test]
    fn test_overdue_with_grace() {
        let rules = BusinessRules::default();
        let due = date(2024, 5, 10);
        assert!(!rules.is_overdue(due, date(2024, 5, 10), 0));
        assert!(rules.is_overdue(due, date(2024, 5, 11), 0));
        assert!(!rules.is_overdue(due, date(2024, 5, 13), 3));
        assert!(rules.is_overdue(due, date(2024, 5, 14), 3));
    }
}
