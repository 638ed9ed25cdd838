//! Tests for domain_orders

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{BusinessCalendar, CustomerId, Money, TenantId};

use domain_orders::{
    BusinessRules, CustomerType, Order, OrderError, OrderStatus, PaymentMethod, PriceTier,
    Product, Unit,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Local Sao Paulo wall time (UTC-3)
fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h + 3, 0, 0).unwrap()
}

fn rice(tenant: TenantId) -> Product {
    Product::new(
        tenant,
        "ARROZ-5KG",
        "Arroz tipo 1 5kg",
        Unit::Pack,
        Money::brl(dec!(10.00)),
        Money::brl(dec!(8.00)),
        dec!(12),
    )
}

fn cheese(tenant: TenantId) -> Product {
    Product::new(
        tenant,
        "QUEIJO-MUS",
        "Queijo mussarela",
        Unit::Kg,
        Money::brl(dec!(40.00)),
        Money::brl(dec!(34.00)),
        Decimal::ZERO,
    )
}

fn draft(customer_type: CustomerType, method: PaymentMethod) -> (Order, TenantId) {
    let tenant = TenantId::new();
    (Order::new(tenant, CustomerId::new(), customer_type, method), tenant)
}

// ============================================================================
// Pricing Tests
// ============================================================================

mod pricing_tests {
    use super::*;

    #[test]
    fn test_retail_customer_small_quantity_pays_retail() {
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(5)).unwrap();

        assert_eq!(order.items[0].tier, PriceTier::Retail);
        assert_eq!(order.subtotal.amount(), dec!(50.00));
    }

    #[test]
    fn test_retail_customer_reaching_min_qty_gets_wholesale_price() {
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(12)).unwrap();

        assert_eq!(order.items[0].tier, PriceTier::Wholesale);
        assert_eq!(order.total.amount(), dec!(96.00));
    }

    #[test]
    fn test_wholesale_customer_always_wholesale() {
        let (mut order, tenant) = draft(CustomerType::Wholesale, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(1)).unwrap();

        assert_eq!(order.items[0].unit_price.amount(), dec!(8.00));
    }

    #[test]
    fn test_fractional_quantity_for_weighed_goods() {
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Cash);
        order.add_item(&cheese(tenant), dec!(0.350)).unwrap();

        assert_eq!(order.total.amount(), dec!(14.00));
    }

    #[test]
    fn test_fractional_quantity_rejected_for_packs() {
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Cash);
        let result = order.add_item(&rice(tenant), dec!(1.5));

        assert!(matches!(result, Err(OrderError::InvalidQuantity(_))));
    }

    #[test]
    fn test_inactive_product_rejected() {
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Cash);
        let mut product = rice(tenant);
        product.active = false;

        assert!(matches!(
            order.add_item(&product, dec!(1)),
            Err(OrderError::InactiveProduct(_))
        ));
    }
}

// ============================================================================
// Totals Tests
// ============================================================================

mod totals_tests {
    use super::*;

    #[test]
    fn test_discount_and_delivery_fee() {
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(5)).unwrap();
        order.apply_discount(Money::brl(dec!(5))).unwrap();
        order.set_delivery_fee(Money::brl(dec!(7.50))).unwrap();

        assert_eq!(order.subtotal.amount(), dec!(50.00));
        assert_eq!(order.total.amount(), dec!(52.50));
    }

    #[test]
    fn test_discount_above_subtotal_rejected() {
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(1)).unwrap();

        assert!(matches!(
            order.apply_discount(Money::brl(dec!(11))),
            Err(OrderError::DiscountExceedsSubtotal { .. })
        ));
    }

    #[test]
    fn test_remove_item_recalculates() {
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        let first = order.add_item(&rice(tenant), dec!(2)).unwrap();
        order.add_item(&cheese(tenant), dec!(1)).unwrap();

        order.remove_item(first).unwrap();

        assert_eq!(order.items.len(), 1);
        assert_eq!(order.total.amount(), dec!(40.00));
    }

    #[test]
    fn test_order_number_prefix() {
        let (order, _) = draft(CustomerType::Retail, PaymentMethod::Cash);
        assert!(order.number.starts_with("PED-"));
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let rules = BusinessRules::default();
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(3)).unwrap();

        order.confirm(local(2024, 5, 14, 10), &rules).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.delivery_date, Some(date(2024, 5, 15)));

        order.start_preparing().unwrap();
        order.dispatch().unwrap();
        order.deliver(local(2024, 5, 15, 9)).unwrap();

        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.delivered_at.is_some());
    }

    #[test]
    fn test_confirm_empty_order_fails() {
        let rules = BusinessRules::default();
        let (mut order, _) = draft(CustomerType::Retail, PaymentMethod::Pix);

        assert!(matches!(
            order.confirm(local(2024, 5, 14, 10), &rules),
            Err(OrderError::EmptyOrder)
        ));
    }

    #[test]
    fn test_wholesale_minimum() {
        let rules = BusinessRules::default();
        let (mut order, tenant) = draft(CustomerType::Wholesale, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(10)).unwrap();

        assert!(matches!(
            order.confirm(local(2024, 5, 14, 10), &rules),
            Err(OrderError::BelowMinimumOrder { .. })
        ));

        order.add_item(&rice(tenant), dec!(30)).unwrap();
        assert!(order.confirm(local(2024, 5, 14, 10), &rules).is_ok());
    }

    #[test]
    fn test_cannot_skip_states() {
        let (mut order, _) = draft(CustomerType::Retail, PaymentMethod::Pix);

        let result = order.dispatch();
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Draft,
                to: OrderStatus::OutForDelivery
            })
        ));
    }

    #[test]
    fn test_items_locked_after_confirmation() {
        let rules = BusinessRules::default();
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(1)).unwrap();
        order.confirm(local(2024, 5, 14, 10), &rules).unwrap();

        assert!(order.add_item(&rice(tenant), dec!(1)).is_err());
    }

    #[test]
    fn test_cancel_inside_edit_window() {
        let rules = BusinessRules::default();
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(1)).unwrap();
        order.confirm(local(2024, 5, 14, 10), &rules).unwrap();

        order
            .cancel(local(2024, 5, 14, 11), "cliente desistiu", &rules)
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.cancel_reason.as_deref(), Some("cliente desistiu"));
    }

    #[test]
    fn test_cancel_after_edit_window_rejected() {
        let rules = BusinessRules::default();
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(1)).unwrap();
        order.confirm(local(2024, 5, 14, 10), &rules).unwrap();

        let result = order.cancel(local(2024, 5, 14, 13), "tarde demais", &rules);
        assert!(matches!(result, Err(OrderError::EditWindowClosed(_))));
    }

    #[test]
    fn test_cannot_cancel_out_for_delivery() {
        let rules = BusinessRules::default();
        let (mut order, tenant) = draft(CustomerType::Retail, PaymentMethod::Pix);
        order.add_item(&rice(tenant), dec!(1)).unwrap();
        order.confirm(local(2024, 5, 14, 10), &rules).unwrap();
        order.start_preparing().unwrap();
        order.dispatch().unwrap();

        assert!(matches!(
            order.cancel(local(2024, 5, 14, 11), "x", &rules),
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_status_wire_names() {
        for status in [
            OrderStatus::Draft,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"OUT_FOR_DELIVERY\"");
    }
}

// ============================================================================
// Installment Tests
// ============================================================================

mod installment_tests {
    use super::*;

    fn confirmed(method: PaymentMethod, quantity: Decimal) -> Order {
        let rules = BusinessRules::default();
        let (mut order, tenant) = draft(CustomerType::Retail, method);
        order.add_item(&rice(tenant), quantity).unwrap();
        order.confirm(local(2024, 5, 14, 10), &rules).unwrap();
        order
    }

    #[test]
    fn test_boleto_installments_split_cents_to_first() {
        let order = confirmed(
            PaymentMethod::Boleto {
                installments: 3,
                first_due_in_days: 30,
                interval_days: 30,
            },
            dec!(10),
        );
        let plan = order
            .installment_plan(date(2024, 5, 14), &BusinessCalendar::default())
            .unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].amount.amount(), dec!(33.34));
        assert_eq!(plan[1].amount.amount(), dec!(33.33));
        assert_eq!(plan[2].amount.amount(), dec!(33.33));
        assert_eq!(plan[0].due_date, date(2024, 6, 13));
        assert_eq!(plan[1].due_date, date(2024, 7, 13));
        assert_eq!(plan[2].due_date, date(2024, 8, 12));
        assert_eq!(plan[2].number, 3);
    }

    #[test]
    fn test_store_credit_due_on_sunday_moves_to_monday() {
        let order = confirmed(PaymentMethod::StoreCredit { due_in_days: 5 }, dec!(2));
        let plan = order
            .installment_plan(date(2024, 5, 14), &BusinessCalendar::default())
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].due_date, date(2024, 5, 20));
        assert_eq!(plan[0].amount.amount(), dec!(20.00));
    }

    #[test]
    fn test_pix_single_immediate_installment() {
        let order = confirmed(PaymentMethod::Pix, dec!(2));
        let plan = order
            .installment_plan(date(2024, 5, 14), &BusinessCalendar::default())
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].due_date, date(2024, 5, 14));
        assert!(!order.payment_method.is_credit());
    }

    #[test]
    fn test_zero_installments_rejected_on_confirm() {
        let rules = BusinessRules::default();
        let (mut order, tenant) = draft(
            CustomerType::Retail,
            PaymentMethod::Boleto {
                installments: 0,
                first_due_in_days: 30,
                interval_days: 30,
            },
        );
        order.add_item(&rice(tenant), dec!(1)).unwrap();

        assert!(matches!(
            order.confirm(local(2024, 5, 14, 10), &rules),
            Err(OrderError::InvalidPaymentTerms(_))
        ));
    }

    proptest! {
        #[test]
        fn installments_always_sum_to_total(
            quantity in 1u32..500,
            installments in 1u32..=12,
        ) {
            let order = confirmed(
                PaymentMethod::Boleto { installments, first_due_in_days: 28, interval_days: 28 },
                Decimal::from(quantity),
            );
            let plan = order
                .installment_plan(date(2024, 5, 14), &BusinessCalendar::default())
                .unwrap();

            let sum = plan
                .iter()
                .fold(Money::brl(Decimal::ZERO), |acc, i| acc + i.amount);
            prop_assert_eq!(sum.amount(), order.total.amount());
            prop_assert!(plan.windows(2).all(|w| w[0].due_date < w[1].due_date));
        }
    }
}
