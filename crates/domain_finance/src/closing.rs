//! Financial closing
//!
//! A closing summarises every bank account over a period and, once closed,
//! locks the period so no entry dated inside it can change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{BankAccountId, ClosingId, Currency, DateRange, Money, TenantId, UserId};
use crate::bank_account::BankAccount;
use crate::entry::{EntryKind, EntryStatus, FinancialEntry};
use crate::error::FinanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosingStatus {
    Open,
    Closed,
}

impl ClosingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClosingStatus::Open => "OPEN",
            ClosingStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(ClosingStatus::Open),
            "CLOSED" => Some(ClosingStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClosingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Movements of one account over the period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub bank_account_id: BankAccountId,
    pub name: String,
    pub opening: Money,
    pub income: Money,
    pub expense: Money,
    pub transfers_in: Money,
    pub transfers_out: Money,
    pub closing: Money,
}

impl AccountSummary {
    fn empty(account: &BankAccount, opening: Money) -> Self {
        let zero = Money::zero(opening.currency());
        Self {
            bank_account_id: account.id,
            name: account.name.clone(),
            opening,
            income: zero,
            expense: zero,
            transfers_in: zero,
            transfers_out: zero,
            closing: opening,
        }
    }

    fn add(&mut self, entry: &FinancialEntry) -> Result<(), FinanceError> {
        let slot = match entry.kind {
            EntryKind::Income => &mut self.income,
            EntryKind::Expense => &mut self.expense,
            EntryKind::TransferIn => &mut self.transfers_in,
            EntryKind::TransferOut => &mut self.transfers_out,
        };
        *slot = slot.checked_add(&entry.amount)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FinanceError> {
        self.closing = self
            .opening
            .checked_add(&self.income)?
            .checked_add(&self.transfers_in)?
            .checked_sub(&self.expense)?
            .checked_sub(&self.transfers_out)?;
        Ok(())
    }
}

/// The closing of one period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialClosing {
    pub id: ClosingId,
    pub tenant_id: TenantId,
    pub period: DateRange,
    pub accounts: Vec<AccountSummary>,
    pub total_income: Money,
    pub total_expense: Money,
    pub net_result: Money,
    pub status: ClosingStatus,
    pub closed_by: Option<UserId>,
    pub closed_at: Option<DateTime<Utc>>,
    pub reopened_by: Option<UserId>,
    pub reopened_at: Option<DateTime<Utc>>,
}

impl FinancialClosing {
    pub fn close(&mut self, by: UserId, at: DateTime<Utc>) -> Result<(), FinanceError> {
        if self.status != ClosingStatus::Open {
            return Err(FinanceError::transition("closing", self.status, ClosingStatus::Closed));
        }
        self.status = ClosingStatus::Closed;
        self.closed_by = Some(by);
        self.closed_at = Some(at);
        Ok(())
    }

    /// Reopens a closed period so it can be corrected
    pub fn reopen(&mut self, by: UserId, at: DateTime<Utc>) -> Result<(), FinanceError> {
        if self.status != ClosingStatus::Closed {
            return Err(FinanceError::transition("closing", self.status, ClosingStatus::Open));
        }
        self.status = ClosingStatus::Open;
        self.reopened_by = Some(by);
        self.reopened_at = Some(at);
        Ok(())
    }

    /// Rejects a new period that overlaps any existing closing
    pub fn ensure_no_overlap(period: &DateRange, existing: &[FinancialClosing]) -> Result<(), FinanceError> {
        match existing.iter().find(|c| c.period.overlaps(period)) {
            Some(c) => Err(FinanceError::OverlappingPeriod(format!(
                "{} to {}",
                c.period.start, c.period.end
            ))),
            None => Ok(()),
        }
    }
}

/// Computes closings from accounts and entries
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosingBuilder {
    /// Refuse to close while pending entries are due inside the period
    pub strict: bool,
}

impl ClosingBuilder {
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Builds an open closing
    ///
    /// `opening_balances` holds each account's balance at the start of the
    /// period; accounts missing from it open at zero.
    pub fn build(
        &self,
        tenant_id: TenantId,
        period: DateRange,
        accounts: &[BankAccount],
        entries: &[FinancialEntry],
        opening_balances: &HashMap<BankAccountId, Money>,
    ) -> Result<FinancialClosing, FinanceError> {
        if self.strict {
            let pending = entries
                .iter()
                .filter(|e| e.status == EntryStatus::Pending)
                .filter(|e| e.due_date.is_some_and(|d| period.contains(d)))
                .count();
            if pending > 0 {
                return Err(FinanceError::PendingEntriesInPeriod(pending));
            }
        }

        let currency = accounts.first().map(|a| a.currency()).unwrap_or(Currency::BRL);
        let mut summaries: Vec<AccountSummary> = accounts
            .iter()
            .map(|a| {
                let opening = opening_balances
                    .get(&a.id)
                    .copied()
                    .unwrap_or_else(|| Money::zero(currency));
                AccountSummary::empty(a, opening)
            })
            .collect();

        for entry in entries
            .iter()
            .filter(|e| e.is_settled() && period.contains(e.competence_date))
        {
            if let Some(summary) = summaries
                .iter_mut()
                .find(|s| s.bank_account_id == entry.bank_account_id)
            {
                summary.add(entry)?;
            }
        }

        let mut total_income = Money::zero(currency);
        let mut total_expense = Money::zero(currency);
        for summary in summaries.iter_mut() {
            summary.finish()?;
            total_income = total_income.checked_add(&summary.income)?;
            total_expense = total_expense.checked_add(&summary.expense)?;
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(FinancialClosing {
            id: ClosingId::new_v7(),
            tenant_id,
            period,
            accounts: summaries,
            total_income,
            total_expense,
            net_result: total_income.checked_sub(&total_expense)?,
            status: ClosingStatus::Open,
            closed_by: None,
            closed_at: None,
            reopened_by: None,
            reopened_at: None,
        })
    }
}
