//! Accounts receivable
//!
//! One receivable per installment of a credit sale. Boleto payments and
//! counter payments both land here; `amount_paid` tracks principal only,
//! fines and interest are kept in `charges_paid`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CustomerId, Money, OrderId, ReceivableId, TenantId};
use crate::error::FinanceError;
use crate::overdue::OverdueSweep;

/// Receivable status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceivableStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl ReceivableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceivableStatus::Pending => "PENDING",
            ReceivableStatus::Partial => "PARTIAL",
            ReceivableStatus::Paid => "PAID",
            ReceivableStatus::Overdue => "OVERDUE",
            ReceivableStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(ReceivableStatus::Pending),
            "PARTIAL" => Some(ReceivableStatus::Partial),
            "PAID" => Some(ReceivableStatus::Paid),
            "OVERDUE" => Some(ReceivableStatus::Overdue),
            "CANCELLED" => Some(ReceivableStatus::Cancelled),
            _ => None,
        }
    }

    /// Still expecting money
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ReceivableStatus::Pending | ReceivableStatus::Partial | ReceivableStatus::Overdue
        )
    }
}

impl std::fmt::Display for ReceivableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Money a customer owes for one installment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receivable {
    pub id: ReceivableId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub order_id: Option<OrderId>,
    pub installment: u32,
    pub description: String,
    pub amount: Money,
    pub amount_paid: Money,
    pub charges_paid: Money,
    pub due_date: NaiveDate,
    pub status: ReceivableStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Receivable {
    pub fn new(
        tenant_id: TenantId,
        customer_id: CustomerId,
        description: impl Into<String>,
        amount: Money,
        due_date: NaiveDate,
    ) -> Result<Self, FinanceError> {
        if !amount.is_positive() {
            return Err(FinanceError::InvalidAmount(format!("receivable of {amount}")));
        }
        Ok(Self {
            id: ReceivableId::new_v7(),
            tenant_id,
            customer_id,
            order_id: None,
            installment: 1,
            description: description.into(),
            amount,
            amount_paid: Money::zero(amount.currency()),
            charges_paid: Money::zero(amount.currency()),
            due_date,
            status: ReceivableStatus::Pending,
            paid_at: None,
            cancel_reason: None,
            created_at: Utc::now(),
        })
    }

    /// Links the receivable to an installment of an order
    pub fn for_order(mut self, order_id: OrderId, installment: u32) -> Self {
        self.order_id = Some(order_id);
        self.installment = installment;
        self
    }

    /// Principal still owed
    pub fn outstanding(&self) -> Money {
        let remaining = self.amount - self.amount_paid;
        if remaining.is_negative() {
            Money::zero(self.amount.currency())
        } else {
            remaining
        }
    }

    /// Registers money received
    ///
    /// `charges` is the part of `amount` that pays fines and interest; the
    /// rest must not exceed the outstanding principal.
    pub fn register_payment(
        &mut self,
        amount: Money,
        charges: Money,
        paid_at: DateTime<Utc>,
    ) -> Result<ReceivableStatus, FinanceError> {
        if !self.status.is_open() {
            return Err(FinanceError::transition("receivable", self.status, ReceivableStatus::Paid));
        }
        if !amount.is_positive() || charges.is_negative() {
            return Err(FinanceError::InvalidAmount(format!("payment of {amount}")));
        }
        let principal = amount.checked_sub(&charges)?;
        if !principal.is_positive() {
            return Err(FinanceError::InvalidAmount(format!(
                "charges {charges} leave nothing for the principal"
            )));
        }
        let outstanding = self.outstanding();
        if principal > outstanding {
            return Err(FinanceError::Overpayment {
                outstanding: outstanding.checked_add(&charges)?,
                attempted: amount,
            });
        }

        self.amount_paid = self.amount_paid.checked_add(&principal)?;
        self.charges_paid = self.charges_paid.checked_add(&charges)?;
        if self.amount_paid >= self.amount {
            self.status = ReceivableStatus::Paid;
            self.paid_at = Some(paid_at);
        } else if self.status != ReceivableStatus::Overdue {
            self.status = ReceivableStatus::Partial;
        }
        Ok(self.status)
    }

    /// Takes back a payment that was reversed at the bank
    ///
    /// The receivable reopens as Overdue only when `sweep` would flag it on `today`.
    pub fn reverse_payment(
        &mut self,
        principal: Money,
        charges: Money,
        today: NaiveDate,
        sweep: &OverdueSweep,
    ) -> Result<ReceivableStatus, FinanceError> {
        if !matches!(self.status, ReceivableStatus::Paid | ReceivableStatus::Partial | ReceivableStatus::Overdue) {
            return Err(FinanceError::transition("receivable", self.status, ReceivableStatus::Pending));
        }
        if principal > self.amount_paid {
            return Err(FinanceError::InvalidAmount(format!(
                "cannot reverse {principal}, only {} was paid",
                self.amount_paid
            )));
        }

        self.amount_paid = self.amount_paid.checked_sub(&principal)?;
        self.charges_paid = self.charges_paid.checked_sub(&charges)?;
        if self.charges_paid.is_negative() {
            self.charges_paid = Money::zero(self.amount.currency());
        }
        self.paid_at = None;
        self.status = if sweep.is_late(self.due_date, today) {
            ReceivableStatus::Overdue
        } else if self.amount_paid.is_positive() {
            ReceivableStatus::Partial
        } else {
            ReceivableStatus::Pending
        };
        Ok(self.status)
    }

    /// Whether the sweep should flag this receivable
    pub fn is_overdue_on(&self, today: NaiveDate, grace_days: u32) -> bool {
        matches!(self.status, ReceivableStatus::Pending | ReceivableStatus::Partial)
            && (today - self.due_date).num_days() > i64::from(grace_days)
    }

    /// Flags the receivable as overdue; returns whether it changed
    pub fn mark_overdue(&mut self, today: NaiveDate, grace_days: u32) -> bool {
        if self.is_overdue_on(today, grace_days) {
            self.status = ReceivableStatus::Overdue;
            true
        } else {
            false
        }
    }

    /// Cancels a receivable that received no payment
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), FinanceError> {
        if !self.status.is_open() {
            return Err(FinanceError::transition("receivable", self.status, ReceivableStatus::Cancelled));
        }
        if self.amount_paid.is_positive() {
            return Err(FinanceError::InvalidOperation(format!(
                "receivable already received {}",
                self.amount_paid
            )));
        }
        self.status = ReceivableStatus::Cancelled;
        self.cancel_reason = Some(reason.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn receivable() -> Receivable {
        Receivable::new(
            TenantId::new(),
            CustomerId::new(),
            "Pedido PED-1 1/1",
            Money::brl(dec!(100)),
            NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_partial_then_paid() {
        let mut r = receivable();
        let zero = Money::brl(dec!(0));

        assert_eq!(
            r.register_payment(Money::brl(dec!(40)), zero, Utc::now()).unwrap(),
            ReceivableStatus::Partial
        );
        assert_eq!(r.outstanding().amount(), dec!(60));
        assert_eq!(
            r.register_payment(Money::brl(dec!(60)), zero, Utc::now()).unwrap(),
            ReceivableStatus::Paid
        );
        assert!(r.paid_at.is_some());
    }

    #[test]
    fn test_overpayment_rejected() {
        let mut r = receivable();
        let result = r.register_payment(Money::brl(dec!(150)), Money::brl(dec!(2)), Utc::now());
        assert!(matches!(result, Err(FinanceError::Overpayment { .. })));
    }

    #[test]
    fn test_cancel_after_payment_rejected() {
        let mut r = receivable();
        r.register_payment(Money::brl(dec!(10)), Money::brl(dec!(0)), Utc::now()).unwrap();
        assert!(r.cancel("erro").is_err());
    }
}
