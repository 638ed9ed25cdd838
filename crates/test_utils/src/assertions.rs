//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_finance::{febraban, Boleto};
use domain_orders::{Installment, Order};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is positive
pub fn assert_money_positive(money: &Money) {
    assert!(money.is_positive(), "Expected positive money, got {}", money.format_brl());
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money.format_brl());
}

/// Asserts that money values sum exactly to a total
pub fn assert_money_sum(parts: &[Money], total: &Money) {
    let sum = parts
        .iter()
        .try_fold(Money::zero(total.currency()), |acc, m| acc.checked_add(m))
        .expect("parts share the total's currency");
    assert_eq!(
        sum.amount(),
        total.amount(),
        "Parts sum to {} but total is {}",
        sum.format_brl(),
        total.format_brl()
    );
}

/// Asserts an installment plan covers the order total with ascending due dates
pub fn assert_installments_cover(order: &Order, plan: &[Installment]) {
    assert!(!plan.is_empty(), "Installment plan is empty");
    let amounts: Vec<Money> = plan.iter().map(|i| i.amount).collect();
    assert_money_sum(&amounts, &order.total);
    for pair in plan.windows(2) {
        assert!(
            pair[0].due_date < pair[1].due_date,
            "Installment {} due {} is not before installment {} due {}",
            pair[0].number,
            pair[0].due_date,
            pair[1].number,
            pair[1].due_date
        );
    }
}

/// Asserts the boleto's barcode and digitable line are well formed and agree
pub fn assert_valid_boleto(boleto: &Boleto) {
    assert_eq!(boleto.barcode.len(), 44, "Barcode must have 44 digits: {}", boleto.barcode);
    assert!(
        febraban::validate_barcode(&boleto.barcode).is_ok(),
        "Barcode check digit is wrong: {}",
        boleto.barcode
    );
    let line = febraban::digitable_line(&boleto.barcode).expect("digitable line from barcode");
    assert_eq!(line, boleto.digitable_line, "Digitable line does not match the barcode");
    assert_eq!(boleto.digitable_line.len(), 47, "Digitable line must have 47 digits");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_money_approx_eq_passes() {
        let a = Money::brl(dec!(100.00));
        let b = Money::brl(dec!(100.01));
        assert_money_approx_eq(&a, &b, dec!(0.01));
    }

    #[test]
    #[should_panic(expected = "differ by more than tolerance")]
    fn test_assert_money_approx_eq_fails() {
        let a = Money::brl(dec!(100.00));
        let b = Money::brl(dec!(100.10));
        assert_money_approx_eq(&a, &b, dec!(0.01));
    }

    #[test]
    fn test_assert_money_sum() {
        let total = Money::brl(dec!(100.00));
        let parts = total.allocate(3).expect("allocate");
        assert_money_sum(&parts, &total);
    }

    #[test]
    #[should_panic(expected = "Parts sum to")]
    fn test_assert_money_sum_fails() {
        let parts = vec![Money::brl(dec!(33.33)), Money::brl(dec!(33.33))];
        assert_money_sum(&parts, &Money::brl(dec!(100.00)));
    }
}
