//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{Duration, NaiveDate};
use core_kernel::{Cpf, Currency, Money};
use domain_orders::PaymentMethod;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for positive amounts in centavos, up to R$ 1 million
pub fn positive_centavos_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for positive BRL amounts
pub fn brl_money_strategy() -> impl Strategy<Value = Money> {
    positive_centavos_strategy().prop_map(|c| Money::from_minor(c, Currency::BRL))
}

/// Strategy for order totals a wholesale customer would place
pub fn wholesale_total_strategy() -> impl Strategy<Value = Money> {
    (30_000i64..5_000_000i64).prop_map(|c| Money::from_minor(c, Currency::BRL))
}

/// Strategy for rates between 0% and 100% with four decimals
pub fn rate_decimal_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..10000u32).prop_map(|n| Decimal::new(n as i64, 4))
}

/// Strategy for quantities sold by unit
pub fn unit_quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..500i64).prop_map(Decimal::from)
}

/// Strategy for weights in kg with three decimals
pub fn kg_quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|g| Decimal::new(g, 3))
}

/// Strategy for boleto payment terms the store accepts
pub fn boleto_terms_strategy() -> impl Strategy<Value = PaymentMethod> {
    (1u32..=12u32, 0u32..=60u32, prop_oneof![Just(7u32), Just(14u32), Just(28u32), Just(30u32)]).prop_map(
        |(installments, first_due_in_days, interval_days)| PaymentMethod::Boleto {
            installments,
            first_due_in_days,
            interval_days,
        },
    )
}

/// Strategy for any accepted payment method
pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Pix),
        Just(PaymentMethod::Card),
        boleto_terms_strategy(),
        (1u32..=45u32).prop_map(|due_in_days| PaymentMethod::StoreCredit { due_in_days }),
    ]
}

/// Strategy for installment counts
pub fn installment_count_strategy() -> impl Strategy<Value = u32> {
    1u32..=24u32
}

/// Strategy for dates in 2026
pub fn date_2026_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..365i64).prop_map(|d| {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or(NaiveDate::MIN) + Duration::days(d)
    })
}

/// Strategy for days late on an overdue boleto
pub fn days_late_strategy() -> impl Strategy<Value = i64> {
    1i64..365i64
}

/// Appends both check digits to nine base digits
fn cpf_from_base(base: &[u32]) -> String {
    let check = |digits: &[u32]| {
        let start = digits.len() as u32 + 1;
        let sum: u32 = digits.iter().enumerate().map(|(i, d)| d * (start - i as u32)).sum();
        let rest = (sum * 10) % 11;
        if rest == 10 { 0 } else { rest }
    };
    let mut digits = base.to_vec();
    digits.push(check(&digits));
    digits.push(check(&digits));
    digits.iter().map(|d| char::from_digit(*d, 10).unwrap_or('0')).collect()
}

/// Strategy for valid CPFs
pub fn cpf_strategy() -> impl Strategy<Value = Cpf> {
    proptest::collection::vec(0u32..10u32, 9)
        .prop_filter("repeated digits", |base| base.iter().any(|d| *d != base[0]))
        .prop_filter_map("check digits", |base| Cpf::parse(&cpf_from_base(&base)).ok())
}

/// Strategy for Brazilian mobile numbers as typed by operators
pub fn br_mobile_strategy() -> impl Strategy<Value = String> {
    (1u32..=9u32, 1u32..=9u32, 0u32..100_000_000u32)
        .prop_map(|(region, area, rest)| format!("({region}{area}) 9{rest:08}"))
}

/// Strategy for customer names
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,12} [A-Z][a-z]{2,15}"
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_brl_money_is_positive(money in brl_money_strategy()) {
            prop_assert!(money.is_positive());
            prop_assert_eq!(money.currency(), Currency::BRL);
        }

        #[test]
        fn test_generated_cpfs_round_trip(cpf in cpf_strategy()) {
            let reparsed = Cpf::parse(cpf.digits());
            prop_assert!(reparsed.is_ok());
        }

        #[test]
        fn test_boleto_terms_are_credit(method in boleto_terms_strategy()) {
            prop_assert!(method.is_credit());
        }

        #[test]
        fn test_generated_mobiles_parse(phone in br_mobile_strategy()) {
            let parsed = domain_messaging::PhoneNumber::parse_br(&phone);
            prop_assert!(parsed.is_ok());
            prop_assert!(parsed.map(|p| p.is_mobile()).unwrap_or(false));
        }

        #[test]
        fn test_kg_quantities_have_grams(q in kg_quantity_strategy()) {
            prop_assert!(q > Decimal::ZERO);
            prop_assert!(q.scale() <= 3);
        }
    }
}
