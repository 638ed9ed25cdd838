//! Boletos
//!
//! A boleto is the bank slip issued for one receivable. Status changes go
//! through the methods below; the database layer persists the result
//! together with the receivable, ledger entry and bank balance.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{BankAccountId, BoletoId, CustomerId, Money, Rate, ReceivableId, TenantId, Timezone};
use crate::bank_account::BankAccount;
use crate::entry::{EntryCategory, FinancialEntry};
use crate::error::FinanceError;
use crate::febraban;
use crate::overdue::OverdueSweep;
use crate::receivable::Receivable;

/// Boleto status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoletoStatus {
    Pending,
    Overdue,
    Paid,
    Cancelled,
}

impl BoletoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoletoStatus::Pending => "PENDING",
            BoletoStatus::Overdue => "OVERDUE",
            BoletoStatus::Paid => "PAID",
            BoletoStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(BoletoStatus::Pending),
            "OVERDUE" => Some(BoletoStatus::Overdue),
            "PAID" => Some(BoletoStatus::Paid),
            "CANCELLED" => Some(BoletoStatus::Cancelled),
            _ => None,
        }
    }

    /// Can still be paid or cancelled
    pub fn is_open(&self) -> bool {
        matches!(self, BoletoStatus::Pending | BoletoStatus::Overdue)
    }
}

impl std::fmt::Display for BoletoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bank slip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boleto {
    pub id: BoletoId,
    pub tenant_id: TenantId,
    pub receivable_id: ReceivableId,
    pub customer_id: CustomerId,
    pub bank_account_id: BankAccountId,
    /// Nosso número, the bank's sequence for this slip
    pub our_number: String,
    pub digitable_line: String,
    pub barcode: String,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: BoletoStatus,
    /// Fine charged once when paid late
    pub fine_rate: Rate,
    /// Interest per 30 days late, charged pro rata per day
    pub monthly_interest_rate: Rate,
    pub paid_amount: Option<Money>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub issued_at: DateTime<Utc>,
}

/// Outcome of paying a boleto
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoletoPayment {
    pub boleto_id: BoletoId,
    pub receivable_id: ReceivableId,
    pub bank_account_id: BankAccountId,
    pub principal: Money,
    /// Fine plus interest
    pub charges: Money,
    pub total: Money,
    pub paid_on: NaiveDate,
    pub paid_at: DateTime<Utc>,
}

impl BoletoPayment {
    /// Ledger movements crediting the collecting account
    ///
    /// Principal is Sales income; fine and interest are LateFees.
    pub fn ledger_entries(&self, tenant_id: TenantId, our_number: &str) -> Result<Vec<FinancialEntry>, FinanceError> {
        let reference = *self.boleto_id.as_uuid();
        let mut entries = vec![FinancialEntry::income(
            tenant_id,
            self.bank_account_id,
            EntryCategory::Sales,
            format!("Boleto {our_number}"),
            self.principal,
            self.paid_on,
        )?
        .with_reference("boleto", reference)];

        if self.charges.is_positive() {
            entries.push(
                FinancialEntry::income(
                    tenant_id,
                    self.bank_account_id,
                    EntryCategory::LateFees,
                    format!("Multa e juros boleto {our_number}"),
                    self.charges,
                    self.paid_on,
                )?
                .with_reference("boleto", reference),
            );
        }
        Ok(entries)
    }
}

impl Boleto {
    /// Days between the due date and `on`, zero when not late
    pub fn days_late(&self, on: NaiveDate) -> i64 {
        (on - self.due_date).num_days().max(0)
    }

    /// Fine plus pro-rata interest owed when paying on `on`
    pub fn charges_on(&self, on: NaiveDate) -> Money {
        let days = self.days_late(on);
        if days == 0 {
            return Money::zero(self.amount.currency());
        }
        let fine = self.fine_rate.apply(&self.amount);
        let daily = self.monthly_interest_rate.as_decimal() / Decimal::from(30);
        let interest = self.amount.multiply(daily * Decimal::from(days));
        (fine + interest).round_to_currency()
    }

    /// Amount to pay on a given date, rounded to cents
    pub fn amount_due(&self, on: NaiveDate) -> Money {
        (self.amount + self.charges_on(on)).round_to_currency()
    }

    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        self.status == BoletoStatus::Pending && today > self.due_date
    }

    /// Pending → Overdue once the due date has passed
    pub fn mark_overdue(&mut self, today: NaiveDate) -> Result<(), FinanceError> {
        if self.status != BoletoStatus::Pending {
            return Err(FinanceError::transition("boleto", self.status, BoletoStatus::Overdue));
        }
        if today <= self.due_date {
            return Err(FinanceError::InvalidOperation(format!(
                "boleto {} is not due until {}",
                self.our_number, self.due_date
            )));
        }
        self.status = BoletoStatus::Overdue;
        Ok(())
    }

    /// Registers payment; `amount` must cover the amount due on the local payment date
    pub fn pay(
        &mut self,
        amount: Money,
        paid_at: DateTime<Utc>,
        timezone: &Timezone,
    ) -> Result<BoletoPayment, FinanceError> {
        if !self.status.is_open() {
            return Err(FinanceError::transition("boleto", self.status, BoletoStatus::Paid));
        }
        let paid_on = timezone.local_date(paid_at);
        let due = self.amount_due(paid_on);
        due.ensure_same_currency(&amount)?;
        if amount < due {
            return Err(FinanceError::Underpayment { due, offered: amount });
        }
        if amount > due {
            return Err(FinanceError::Overpayment {
                outstanding: due,
                attempted: amount,
            });
        }

        let charges = due.checked_sub(&self.amount)?;
        self.status = BoletoStatus::Paid;
        self.paid_amount = Some(amount);
        self.paid_at = Some(paid_at);
        debug!(boleto = %self.id, amount = %amount, charges = %charges, "boleto paid");

        Ok(BoletoPayment {
            boleto_id: self.id,
            receivable_id: self.receivable_id,
            bank_account_id: self.bank_account_id,
            principal: self.amount,
            charges,
            total: amount,
            paid_on,
            paid_at,
        })
    }

    /// Pending/Overdue → Cancelled
    pub fn cancel(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Result<(), FinanceError> {
        if !self.status.is_open() {
            return Err(FinanceError::transition("boleto", self.status, BoletoStatus::Cancelled));
        }
        self.status = BoletoStatus::Cancelled;
        self.cancelled_at = Some(at);
        self.cancel_reason = Some(reason.into());
        Ok(())
    }

    /// Estorno: Paid → Pending, or Overdue when the sweep would already flag it
    ///
    /// Returns the payment being undone so the caller can reverse its ledger
    /// entries and bank balance.
    pub fn reverse_payment(
        &mut self,
        reversed_at: DateTime<Utc>,
        timezone: &Timezone,
        sweep: &OverdueSweep,
    ) -> Result<BoletoPayment, FinanceError> {
        if self.status != BoletoStatus::Paid {
            return Err(FinanceError::transition("boleto", self.status, BoletoStatus::Pending));
        }
        let (total, paid_at) = match (self.paid_amount, self.paid_at) {
            (Some(total), Some(paid_at)) => (total, paid_at),
            _ => {
                return Err(FinanceError::InvalidOperation(
                    "paid boleto without payment data".to_string(),
                ))
            }
        };
        let payment = BoletoPayment {
            boleto_id: self.id,
            receivable_id: self.receivable_id,
            bank_account_id: self.bank_account_id,
            principal: self.amount,
            charges: total.checked_sub(&self.amount)?,
            total,
            paid_on: timezone.local_date(paid_at),
            paid_at,
        };

        let today = timezone.local_date(reversed_at);
        self.status = if sweep.is_late(self.due_date, today) {
            BoletoStatus::Overdue
        } else {
            BoletoStatus::Pending
        };
        self.paid_amount = None;
        self.paid_at = None;
        Ok(payment)
    }

    pub fn formatted_line(&self) -> String {
        febraban::format_digitable_line(&self.digitable_line)
    }
}

/// Issues boletos for receivables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoletoIssuer {
    /// Bank portfolio code
    pub carteira: String,
    pub fine_rate: Rate,
    pub monthly_interest_rate: Rate,
}

impl Default for BoletoIssuer {
    fn default() -> Self {
        Self {
            carteira: "09".to_string(),
            fine_rate: Rate::from_percentage(dec!(2)),
            monthly_interest_rate: Rate::from_percentage(dec!(1)),
        }
    }
}

impl BoletoIssuer {
    /// Issues a boleto for the outstanding amount of a receivable
    pub fn issue(
        &self,
        receivable: &Receivable,
        account: &BankAccount,
        our_number: u64,
        now: DateTime<Utc>,
    ) -> Result<Boleto, FinanceError> {
        if !receivable.status.is_open() {
            return Err(FinanceError::InvalidOperation(format!(
                "receivable {} is {}",
                receivable.id, receivable.status
            )));
        }
        if account.bank_code.is_empty() {
            return Err(FinanceError::InvalidBoletoData(format!(
                "account {} has no bank code",
                account.name
            )));
        }

        let amount = receivable.outstanding();
        let our_number = format!("{our_number:011}");
        let free = febraban::free_field(&account.agency, &self.carteira, &our_number, &account.number)?;
        let barcode = febraban::barcode(&account.bank_code, receivable.due_date, &amount, &free)?;
        let digitable_line = febraban::digitable_line(&barcode)?;

        Ok(Boleto {
            id: BoletoId::new_v7(),
            tenant_id: receivable.tenant_id,
            receivable_id: receivable.id,
            customer_id: receivable.customer_id,
            bank_account_id: account.id,
            our_number,
            digitable_line,
            barcode,
            amount,
            due_date: receivable.due_date,
            status: BoletoStatus::Pending,
            fine_rate: self.fine_rate,
            monthly_interest_rate: self.monthly_interest_rate,
            paid_amount: None,
            paid_at: None,
            cancelled_at: None,
            cancel_reason: None,
            issued_at: now,
        })
    }
}
