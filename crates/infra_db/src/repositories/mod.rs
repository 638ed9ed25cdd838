//! Repository implementations for domain entities
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! domain types. Every query is scoped by the tenant that owns the rows.
//!
//! # Architecture
//!
//! - Row structs derive `sqlx::FromRow` and convert into domain types
//! - Queries are built at runtime with `sqlx::query_as`
//! - Flows that change money run inside one transaction with row locks

pub mod tenant;
pub mod orders;
pub mod finance;
pub mod hr;
pub mod loyalty;
pub mod fiscal;
pub mod messaging;

pub use tenant::{TenantRecord, TenantRepository};
pub use orders::OrderRepository;
pub use finance::{ConfirmedReceivables, FinanceRepository};
pub use hr::HrRepository;
pub use loyalty::{LoyaltyRepository, PointsAwarded};
pub use fiscal::FiscalRepository;
pub use messaging::MessagingRepository;

use rust_decimal::Decimal;

use core_kernel::{Currency, Money};
use crate::error::DatabaseError;

pub(crate) fn currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_code(code).map_err(|_| DatabaseError::invalid_value("currency", code))
}

pub(crate) fn money(amount: Decimal, currency: Currency) -> Money {
    Money::new(amount, currency)
}

/// Parses a status or kind column with the domain's own parser
pub(crate) fn column<T>(
    name: &str,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, DatabaseError> {
    parse(value).ok_or_else(|| DatabaseError::invalid_value(name, value))
}

pub(crate) fn to_u32(name: &str, value: i32) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|_| DatabaseError::invalid_value(name, value))
}

pub(crate) fn to_u64(name: &str, value: i64) -> Result<u64, DatabaseError> {
    u64::try_from(value).map_err(|_| DatabaseError::invalid_value(name, value))
}

pub(crate) fn to_i64(name: &str, value: u64) -> Result<i64, DatabaseError> {
    i64::try_from(value).map_err(|_| DatabaseError::invalid_value(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_to_u32_accepts_only_non_negative(value in any::<i32>()) {
            prop_assert_eq!(to_u32("n", value).is_ok(), value >= 0);
        }

        #[test]
        fn prop_u64_survives_bigint_column(value in 0u64..=i64::MAX as u64) {
            let stored = to_i64("n", value).unwrap();
            prop_assert_eq!(to_u64("n", stored).unwrap(), value);
        }
    }

    #[test]
    fn test_unknown_currency_is_rejected() {
        assert!(currency("BRL").is_ok());
        assert!(matches!(currency("XYZ"), Err(DatabaseError::SerializationError(_))));
    }
}
