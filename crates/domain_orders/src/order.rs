//! Order aggregate
//!
//! The order is the consistency boundary for items, totals and status. Totals
//! are recomputed on every item change; status changes go through explicit
//! transition methods that reject anything outside the lifecycle.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{
    BusinessCalendar, Currency, CustomerId, Money, OrderId, OrderItemId, ProductId, TenantId,
};

use crate::business_rules::BusinessRules;
use crate::customer::CustomerType;
use crate::error::OrderError;
use crate::product::{PriceTier, Product};

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(OrderStatus::Draft),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "PREPARING" => Some(OrderStatus::Preparing),
            "OUT_FOR_DELIVERY" => Some(OrderStatus::OutForDelivery),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Allowed lifecycle edges
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Draft, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, OutForDelivery)
                | (OutForDelivery, Delivered)
                | (Draft, Cancelled)
                | (Confirmed, Cancelled)
                | (Preparing, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

/// How the customer pays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Pix,
    Card,
    /// Bank slips, one per installment
    Boleto {
        installments: u32,
        first_due_in_days: u32,
        interval_days: u32,
    },
    /// "Fiado": a single receivable without a boleto
    StoreCredit {
        due_in_days: u32,
    },
}

impl PaymentMethod {
    /// Whether the sale creates receivables to be collected later
    pub fn is_credit(&self) -> bool {
        matches!(self, PaymentMethod::Boleto { .. } | PaymentMethod::StoreCredit { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Card => "card",
            PaymentMethod::Boleto { .. } => "boleto",
            PaymentMethod::StoreCredit { .. } => "store_credit",
        }
    }
}

/// One installment of an order's payment plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub number: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
}

/// A line of an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub tier: PriceTier,
    pub discount: Money,
}

impl OrderItem {
    pub fn total(&self) -> Money {
        (self.unit_price * self.quantity - self.discount).round_to_currency()
    }
}

/// A customer order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub tenant_id: TenantId,
    pub number: String,
    pub customer_id: CustomerId,
    pub customer_type: CustomerType,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub delivery_fee: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl Order {
    /// Starts a draft order for a customer
    pub fn new(
        tenant_id: TenantId,
        customer_id: CustomerId,
        customer_type: CustomerType,
        payment_method: PaymentMethod,
    ) -> Self {
        let zero = Money::zero(Currency::BRL);
        Self {
            id: OrderId::new_v7(),
            tenant_id,
            number: generate_order_number(),
            customer_id,
            customer_type,
            items: Vec::new(),
            subtotal: zero,
            discount: zero,
            delivery_fee: zero,
            total: zero,
            payment_method,
            status: OrderStatus::Draft,
            delivery_date: None,
            notes: None,
            placed_at: Utc::now(),
            confirmed_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancel_reason: None,
        }
    }

    /// Adds a product, priced for this order's customer type
    pub fn add_item(&mut self, product: &Product, quantity: Decimal) -> Result<OrderItemId, OrderError> {
        self.ensure_status(OrderStatus::Draft, OrderStatus::Draft)?;
        if !product.active {
            return Err(OrderError::InactiveProduct(product.sku.clone()));
        }
        if quantity <= Decimal::ZERO {
            return Err(OrderError::InvalidQuantity(quantity.to_string()));
        }
        if !product.unit.is_fractional() && !quantity.fract().is_zero() {
            return Err(OrderError::InvalidQuantity(format!(
                "{} {} must be a whole number",
                quantity,
                product.unit.as_str()
            )));
        }

        let (tier, unit_price) = product.price_for(self.customer_type, quantity);
        let item = OrderItem {
            id: OrderItemId::new(),
            product_id: product.id,
            description: product.name.clone(),
            quantity,
            unit_price,
            tier,
            discount: Money::zero(unit_price.currency()),
        };
        let id = item.id;
        self.items.push(item);
        self.recalculate_totals()?;
        Ok(id)
    }

    pub fn remove_item(&mut self, item_id: OrderItemId) -> Result<(), OrderError> {
        self.ensure_status(OrderStatus::Draft, OrderStatus::Draft)?;
        let before = self.items.len();
        self.items.retain(|i| i.id != item_id);
        if self.items.len() == before {
            return Err(OrderError::ItemNotFound(item_id.to_string()));
        }
        self.recalculate_totals()
    }

    /// Sets an order-level discount
    pub fn apply_discount(&mut self, discount: Money) -> Result<(), OrderError> {
        self.ensure_status(OrderStatus::Draft, OrderStatus::Draft)?;
        if discount.is_negative() || discount > self.subtotal {
            return Err(OrderError::DiscountExceedsSubtotal {
                discount,
                subtotal: self.subtotal,
            });
        }
        self.discount = discount;
        self.recalculate_totals()
    }

    pub fn set_delivery_fee(&mut self, fee: Money) -> Result<(), OrderError> {
        self.ensure_status(OrderStatus::Draft, OrderStatus::Draft)?;
        if fee.is_negative() {
            return Err(OrderError::InvalidQuantity(format!("delivery fee {fee}")));
        }
        self.delivery_fee = fee;
        self.recalculate_totals()
    }

    /// Confirms a draft: validates it and fixes the delivery date
    pub fn confirm(&mut self, now: DateTime<Utc>, rules: &BusinessRules) -> Result<(), OrderError> {
        self.ensure_transition(OrderStatus::Confirmed)?;
        if self.items.is_empty() || !self.total.is_positive() {
            return Err(OrderError::EmptyOrder);
        }
        if self.customer_type == CustomerType::Wholesale && self.total < rules.min_wholesale_order {
            return Err(OrderError::BelowMinimumOrder {
                minimum: rules.min_wholesale_order,
                total: self.total,
            });
        }
        validate_terms(&self.payment_method)?;

        self.delivery_date = Some(rules.delivery_date_for(now));
        self.confirmed_at = Some(now);
        self.status = OrderStatus::Confirmed;
        debug!(order = %self.id, delivery = ?self.delivery_date, "order confirmed");
        Ok(())
    }

    pub fn start_preparing(&mut self) -> Result<(), OrderError> {
        self.ensure_transition(OrderStatus::Preparing)?;
        self.status = OrderStatus::Preparing;
        Ok(())
    }

    pub fn dispatch(&mut self) -> Result<(), OrderError> {
        self.ensure_transition(OrderStatus::OutForDelivery)?;
        self.status = OrderStatus::OutForDelivery;
        Ok(())
    }

    pub fn deliver(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_transition(OrderStatus::Delivered)?;
        self.status = OrderStatus::Delivered;
        self.delivered_at = Some(now);
        Ok(())
    }

    /// Cancels the order
    ///
    /// Drafts can always be cancelled. Confirmed and Preparing orders only
    /// while the edit window before delivery is open.
    pub fn cancel(
        &mut self,
        now: DateTime<Utc>,
        reason: impl Into<String>,
        rules: &BusinessRules,
    ) -> Result<(), OrderError> {
        self.ensure_transition(OrderStatus::Cancelled)?;
        if self.status != OrderStatus::Draft {
            if let Some(delivery) = self.delivery_date {
                if !rules.can_edit(now, delivery) {
                    return Err(OrderError::EditWindowClosed(
                        rules.edit_deadline(delivery).to_rfc3339(),
                    ));
                }
            }
        }
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancel_reason = Some(reason.into());
        Ok(())
    }

    /// Splits the total into installments according to the payment method
    ///
    /// Cash, Pix and card sales produce one installment due on `issue_date`.
    /// Due dates that fall on closed days move to the next business day.
    pub fn installment_plan(
        &self,
        issue_date: NaiveDate,
        calendar: &BusinessCalendar,
    ) -> Result<Vec<Installment>, OrderError> {
        let (count, first, interval) = match &self.payment_method {
            PaymentMethod::Boleto { installments, first_due_in_days, interval_days } => {
                (*installments, *first_due_in_days, *interval_days)
            }
            PaymentMethod::StoreCredit { due_in_days } => (1, *due_in_days, 0),
            PaymentMethod::Cash | PaymentMethod::Pix | PaymentMethod::Card => (1, 0, 0),
        };

        let amounts = self.total.allocate(count)?;
        amounts
            .into_iter()
            .enumerate()
            .map(|(i, amount)| {
                let offset = u64::from(first) + u64::from(interval) * i as u64;
                let raw_due = issue_date
                    .checked_add_days(Days::new(offset))
                    .ok_or_else(|| OrderError::InvalidPaymentTerms(format!("offset {offset} days")))?;
                let due_date = if offset == 0 {
                    raw_due
                } else {
                    calendar.adjust_due_date(raw_due)
                };
                Ok(Installment {
                    number: i as u32 + 1,
                    amount,
                    due_date,
                })
            })
            .collect()
    }

    fn ensure_transition(&self, next: OrderStatus) -> Result<(), OrderError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    fn ensure_status(&self, expected: OrderStatus, attempted: OrderStatus) -> Result<(), OrderError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                from: self.status,
                to: attempted,
            })
        }
    }

    fn recalculate_totals(&mut self) -> Result<(), OrderError> {
        let currency = self.total.currency();
        self.subtotal = self
            .items
            .iter()
            .try_fold(Money::zero(currency), |acc, item| acc.checked_add(&item.total()))?;
        if self.discount > self.subtotal {
            self.discount = self.subtotal;
        }
        self.total = self
            .subtotal
            .checked_sub(&self.discount)?
            .checked_add(&self.delivery_fee)?;
        Ok(())
    }
}

fn validate_terms(method: &PaymentMethod) -> Result<(), OrderError> {
    match method {
        PaymentMethod::Boleto { installments, interval_days, .. } => {
            if *installments == 0 || *installments > 12 {
                return Err(OrderError::InvalidPaymentTerms(format!(
                    "{installments} installments (1 to 12 allowed)"
                )));
            }
            if *installments > 1 && *interval_days == 0 {
                return Err(OrderError::InvalidPaymentTerms(
                    "installments need an interval".to_string(),
                ));
            }
            Ok(())
        }
        PaymentMethod::StoreCredit { due_in_days } if *due_in_days == 0 => Err(
            OrderError::InvalidPaymentTerms("store credit must be due in the future".to_string()),
        ),
        _ => Ok(()),
    }
}

/// Generates a human-readable order number
fn generate_order_number() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("PED-{}", duration.as_millis() % 10_000_000_000)
}
