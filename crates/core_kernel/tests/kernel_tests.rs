//! Tests for core_kernel public types

use chrono::{NaiveDate, TimeZone, Utc, Weekday};
use rust_decimal_macros::dec;

use core_kernel::{
    BusinessCalendar, CoreError, Cnpj, Cpf, Currency, DateRange, DocumentError, Money,
    MoneyError, Rate, TaxDocument, Timezone,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Money Tests
// ============================================================================

mod money_tests {
    use super::*;

    #[test]
    fn test_installments_split_keeps_total() {
        let total = Money::brl(dec!(1000.00));
        let parts = total.allocate(3).unwrap();

        assert_eq!(
            parts.iter().map(|p| p.amount()).collect::<Vec<_>>(),
            vec![dec!(333.34), dec!(333.33), dec!(333.33)]
        );
    }

    #[test]
    fn test_allocate_zero_parts_fails() {
        let result = Money::brl(dec!(10)).allocate(0);
        assert!(matches!(result, Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_allocate_by_ratios_last_takes_remainder() {
        let total = Money::brl(dec!(100.00));
        let parts = total
            .allocate_by_ratios(&[dec!(1), dec!(1), dec!(1)])
            .unwrap();

        assert_eq!(parts[0].amount(), dec!(33.33));
        assert_eq!(parts[2].amount(), dec!(33.34));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(Money::brl(dec!(2.345)).round_to_currency().amount(), dec!(2.35));
        assert_eq!(Money::brl(dec!(2.349)).truncate_to_currency().amount(), dec!(2.34));
    }

    #[test]
    fn test_currency_from_code() {
        assert_eq!(Currency::from_code("brl").unwrap(), Currency::BRL);
        assert!(matches!(
            Currency::from_code("XYZ"),
            Err(MoneyError::UnknownCurrency(_))
        ));
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate::from_percentage(dec!(2)).to_string(), "2%");
        assert_eq!(Rate::new(dec!(0.075)).to_string(), "7.5%");
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(
            Money::brl(dec!(1)).divide(dec!(0)),
            Err(MoneyError::DivisionByZero)
        );
    }

    #[test]
    fn test_ordering_within_one_currency() {
        let small = Money::brl(dec!(10.00));
        let large = Money::brl(dec!(10.01));
        assert!(small < large);
        assert!(large >= small);
        assert_eq!(small.partial_cmp(&Money::new(dec!(10.00), Currency::USD)), None);
        assert!(!(small < Money::new(dec!(99), Currency::USD)));
    }
}

// ============================================================================
// Calendar Tests
// ============================================================================

mod calendar_tests {
    use super::*;

    #[test]
    fn test_add_business_days_over_weekend() {
        let calendar = BusinessCalendar::default();
        // Friday + 2 business days = Monday (Saturday counts, Sunday does not)
        assert_eq!(calendar.add_business_days(date(2024, 5, 10), 2), date(2024, 5, 13));
    }

    #[test]
    fn test_adjust_due_date_on_sunday() {
        let calendar = BusinessCalendar::default();
        assert_eq!(calendar.adjust_due_date(date(2024, 5, 12)), date(2024, 5, 13));
        assert_eq!(calendar.adjust_due_date(date(2024, 5, 13)), date(2024, 5, 13));
    }

    #[test]
    fn test_saturday_closed_calendar() {
        let calendar = BusinessCalendar::default()
            .with_closed_weekdays(vec![Weekday::Sat, Weekday::Sun]);
        assert_eq!(calendar.next_business_day(date(2024, 5, 10)), date(2024, 5, 13));
    }

    #[test]
    fn test_start_of_day_in_utc() {
        let tz = Timezone::default();
        let start = tz.start_of_day(date(2024, 6, 1));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap());
        assert_eq!(tz.end_of_day(date(2024, 6, 1)), Utc.with_ymd_and_hms(2024, 6, 2, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_timezone_parse_and_serde() {
        let tz = Timezone::parse("America/Manaus").unwrap();
        let json = serde_json::to_string(&tz).unwrap();
        assert_eq!(json, "\"America/Manaus\"");
        assert!(Timezone::parse("Mars/Olympus").is_err());
    }

    #[test]
    fn test_date_range_overlap() {
        let may = DateRange::month(2024, 5).unwrap();
        let last_week = DateRange::new(date(2024, 5, 25), date(2024, 6, 2)).unwrap();
        let june = DateRange::month(2024, 6).unwrap();

        assert!(may.overlaps(&last_week));
        assert!(!may.overlaps(&june));
        assert!(DateRange::day(date(2024, 5, 31)).overlaps(&may));
    }
}

// ============================================================================
// Document Tests
// ============================================================================

mod document_tests {
    use super::*;

    #[test]
    fn test_cpf_serde_validates() {
        let ok: Result<Cpf, _> = serde_json::from_str("\"529.982.247-25\"");
        assert!(ok.is_ok());

        let bad: Result<Cpf, _> = serde_json::from_str("\"529.982.247-00\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_cnpj_wrong_length() {
        assert_eq!(
            Cnpj::parse("11.222.333/0001"),
            Err(DocumentError::InvalidLength { kind: "CNPJ", expected: 14, actual: 12 })
        );
    }

    #[test]
    fn test_tax_document_display() {
        let doc = TaxDocument::parse("11222333000181").unwrap();
        assert_eq!(doc.to_string(), "11.222.333/0001-81");
        assert_eq!(doc.digits(), "11222333000181");
    }

    #[test]
    fn test_document_error_converts_to_core_error() {
        let err: CoreError = Cpf::parse("000").unwrap_err().into();
        assert!(matches!(err, CoreError::Document(_)));
    }
}
