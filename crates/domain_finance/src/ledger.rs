//! Tenant ledger
//!
//! This module keeps bank balances consistent with settled entries. It is
//! the in-memory counterpart of the transactional flows in the database
//! layer, which load the affected rows, apply the same operations and write
//! them back in one transaction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use core_kernel::{BankAccountId, Currency, DateRange, FinancialEntryId, Money, TenantId};
use crate::bank_account::BankAccount;
use crate::closing::{ClosingBuilder, FinancialClosing};
use crate::entry::{EntryCategory, EntryKind, EntryStatus, FinancialEntry};
use crate::error::FinanceError;

/// The ledger of one tenant
///
/// # Invariants
///
/// - A bank balance equals its opening balance plus every settled entry
/// - Settled entries are never edited, only reversed
/// - Nothing dated inside a closed period changes
#[derive(Debug)]
pub struct Ledger {
    tenant_id: TenantId,
    currency: Currency,
    accounts: HashMap<BankAccountId, BankAccount>,
    /// Balances at the moment each account joined the ledger
    opening_balances: HashMap<BankAccountId, Money>,
    entries: Vec<FinancialEntry>,
    closed_periods: Vec<DateRange>,
    allow_overdraft: bool,
}

/// Result of checking an account against its entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub bank_account_id: BankAccountId,
    pub expected: Money,
    pub actual: Money,
    pub difference: Money,
    pub balanced: bool,
}

impl Ledger {
    pub fn new(tenant_id: TenantId, currency: Currency) -> Self {
        Self {
            tenant_id,
            currency,
            accounts: HashMap::new(),
            opening_balances: HashMap::new(),
            entries: Vec::new(),
            closed_periods: Vec::new(),
            allow_overdraft: false,
        }
    }

    /// Lets checking and provider accounts go negative
    pub fn with_overdraft(mut self, allow: bool) -> Self {
        self.allow_overdraft = allow;
        self
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Adds an account; its current balance becomes the opening balance
    pub fn add_account(&mut self, account: BankAccount) -> Result<(), FinanceError> {
        if self.accounts.contains_key(&account.id) {
            return Err(FinanceError::AccountAlreadyExists(account.id.to_string()));
        }
        if account.currency() != self.currency {
            return Err(FinanceError::InvalidOperation(format!(
                "account currency {} differs from ledger currency {}",
                account.currency(),
                self.currency
            )));
        }
        self.opening_balances.insert(account.id, account.balance);
        self.accounts.insert(account.id, account);
        Ok(())
    }

    pub fn account(&self, id: &BankAccountId) -> Option<&BankAccount> {
        self.accounts.get(id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &BankAccount> {
        self.accounts.values()
    }

    pub fn balance(&self, id: &BankAccountId) -> Option<Money> {
        self.accounts.get(id).map(|a| a.balance)
    }

    pub fn entry(&self, id: &FinancialEntryId) -> Option<&FinancialEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn entries(&self) -> &[FinancialEntry] {
        &self.entries
    }

    /// Loads an entry that is already persisted, without moving balances
    ///
    /// Used when rebuilding a ledger slice from storage; the account balances
    /// loaded alongside already reflect its settlement.
    pub fn restore(&mut self, entry: FinancialEntry) -> Result<(), FinanceError> {
        if !self.accounts.contains_key(&entry.bank_account_id) {
            return Err(FinanceError::AccountNotFound(entry.bank_account_id.to_string()));
        }
        if self.entry(&entry.id).is_none() {
            self.entries.push(entry);
        }
        Ok(())
    }

    /// Records a pending entry
    pub fn record(&mut self, entry: FinancialEntry) -> Result<FinancialEntryId, FinanceError> {
        self.ensure_open(entry.competence_date)?;
        let account = self
            .accounts
            .get(&entry.bank_account_id)
            .ok_or_else(|| FinanceError::AccountNotFound(entry.bank_account_id.to_string()))?;
        if !account.active {
            return Err(FinanceError::InactiveAccount(account.name.clone()));
        }
        if entry.status != EntryStatus::Pending {
            return Err(FinanceError::transition("entry", entry.status, EntryStatus::Pending));
        }

        let id = entry.id;
        self.entries.push(entry);
        Ok(id)
    }

    /// Records an entry and settles it immediately
    pub fn record_settled(
        &mut self,
        entry: FinancialEntry,
        at: DateTime<Utc>,
    ) -> Result<FinancialEntryId, FinanceError> {
        let id = self.record(entry)?;
        if let Err(e) = self.settle(&id, at) {
            self.entries.retain(|entry| entry.id != id);
            return Err(e);
        }
        Ok(id)
    }

    /// Settles a pending entry and moves the bank balance
    pub fn settle(&mut self, id: &FinancialEntryId, at: DateTime<Utc>) -> Result<(), FinanceError> {
        let index = self.index_of(id)?;
        let entry = &self.entries[index];
        self.ensure_open(entry.competence_date)?;
        if entry.status != EntryStatus::Pending {
            return Err(FinanceError::transition("entry", entry.status, EntryStatus::Settled));
        }

        let (account_id, kind, amount) = (entry.bank_account_id, entry.kind, entry.amount);
        self.apply(account_id, kind, amount)?;

        let entry = &mut self.entries[index];
        entry.status = EntryStatus::Settled;
        entry.settled_at = Some(at);
        debug!(entry = %entry.id, kind = kind.as_str(), amount = %amount, "entry settled");
        Ok(())
    }

    /// Cancels a pending entry
    pub fn cancel(&mut self, id: &FinancialEntryId) -> Result<(), FinanceError> {
        let index = self.index_of(id)?;
        let entry = &self.entries[index];
        self.ensure_open(entry.competence_date)?;
        if entry.status != EntryStatus::Pending {
            return Err(FinanceError::transition("entry", entry.status, EntryStatus::Cancelled));
        }
        self.entries[index].status = EntryStatus::Cancelled;
        Ok(())
    }

    /// Undoes a settled entry by posting its opposite
    ///
    /// The reversal shares the original competence date and category, so the
    /// pair nets to zero in closings and in the DRE.
    pub fn reverse(
        &mut self,
        id: &FinancialEntryId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<FinancialEntryId, FinanceError> {
        let original = self
            .entry(id)
            .ok_or_else(|| FinanceError::EntryNotFound(id.to_string()))?
            .clone();
        self.ensure_open(original.competence_date)?;
        if original.status != EntryStatus::Settled {
            return Err(FinanceError::InvalidOperation(format!(
                "only settled entries can be reversed, entry is {}",
                original.status
            )));
        }
        if original.is_reversed() || original.reversal_of.is_some() {
            return Err(FinanceError::InvalidOperation(format!("entry {id} was already reversed")));
        }

        let mut reversal = FinancialEntry::new(
            original.tenant_id,
            original.bank_account_id,
            original.kind.opposite(),
            original.category,
            format!("Estorno: {} ({})", original.description, reason),
            original.amount,
            original.competence_date,
        )?;
        reversal.reversal_of = Some(original.id);
        reversal.reference_type = original.reference_type.clone();
        reversal.reference_id = original.reference_id;

        let reversal_id = self.record_settled(reversal, at)?;
        let index = self.index_of(id)?;
        self.entries[index].reversed_by = Some(reversal_id);
        Ok(reversal_id)
    }

    /// Moves money between two of the tenant's accounts
    pub fn transfer(
        &mut self,
        from: BankAccountId,
        to: BankAccountId,
        amount: Money,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<(FinancialEntryId, FinancialEntryId), FinanceError> {
        if from == to {
            return Err(FinanceError::InvalidOperation(
                "cannot transfer to the same account".to_string(),
            ));
        }
        self.ensure_open(date)?;
        let from_name = self
            .accounts
            .get(&from)
            .map(|a| a.name.clone())
            .ok_or_else(|| FinanceError::AccountNotFound(from.to_string()))?;
        let to_name = self
            .accounts
            .get(&to)
            .map(|a| a.name.clone())
            .ok_or_else(|| FinanceError::AccountNotFound(to.to_string()))?;

        let mut out = FinancialEntry::new(
            self.tenant_id,
            from,
            EntryKind::TransferOut,
            EntryCategory::Transfer,
            format!("Transferência para {to_name}"),
            amount,
            date,
        )?;
        let mut incoming = FinancialEntry::new(
            self.tenant_id,
            to,
            EntryKind::TransferIn,
            EntryCategory::Transfer,
            format!("Transferência de {from_name}"),
            amount,
            date,
        )?;
        out.transfer_pair = Some(incoming.id);
        incoming.transfer_pair = Some(out.id);

        let out_id = self.record_settled(out, at)?;
        let in_id = self.record_settled(incoming, at)?;
        Ok((out_id, in_id))
    }

    /// Compares an account balance with its opening balance plus settled entries
    pub fn reconcile(&self, account_id: &BankAccountId) -> Result<Reconciliation, FinanceError> {
        let account = self
            .accounts
            .get(account_id)
            .ok_or_else(|| FinanceError::AccountNotFound(account_id.to_string()))?;
        let opening = self
            .opening_balances
            .get(account_id)
            .copied()
            .unwrap_or_else(|| Money::zero(self.currency));

        let expected = self
            .entries
            .iter()
            .filter(|e| &e.bank_account_id == account_id && e.is_settled())
            .try_fold(opening, |acc, e| acc.checked_add(&e.signed_amount()))?;
        let difference = account.balance.checked_sub(&expected)?;

        Ok(Reconciliation {
            bank_account_id: *account_id,
            expected,
            actual: account.balance,
            difference,
            balanced: difference.is_zero(),
        })
    }

    /// Balance of an account at the start of `date`
    pub fn balance_before(&self, account_id: &BankAccountId, date: NaiveDate) -> Result<Money, FinanceError> {
        let opening = self
            .opening_balances
            .get(account_id)
            .copied()
            .ok_or_else(|| FinanceError::AccountNotFound(account_id.to_string()))?;
        let balance = self
            .entries
            .iter()
            .filter(|e| &e.bank_account_id == account_id && e.is_settled() && e.competence_date < date)
            .try_fold(opening, |acc, e| acc.checked_add(&e.signed_amount()))?;
        Ok(balance)
    }

    /// Builds the closing of a period from this ledger's accounts and entries
    pub fn build_closing(
        &self,
        period: DateRange,
        builder: &ClosingBuilder,
    ) -> Result<FinancialClosing, FinanceError> {
        let openings = self
            .accounts
            .keys()
            .map(|id| Ok((*id, self.balance_before(id, period.start)?)))
            .collect::<Result<HashMap<_, _>, FinanceError>>()?;
        let accounts: Vec<BankAccount> = self.accounts.values().cloned().collect();
        builder.build(self.tenant_id, period, &accounts, &self.entries, &openings)
    }

    /// Locks a period against changes
    pub fn lock_period(&mut self, period: DateRange) -> Result<(), FinanceError> {
        if let Some(existing) = self.closed_periods.iter().find(|p| p.overlaps(&period)) {
            return Err(FinanceError::OverlappingPeriod(format!(
                "{} to {}",
                existing.start, existing.end
            )));
        }
        self.closed_periods.push(period);
        Ok(())
    }

    /// Unlocks a previously closed period
    pub fn unlock_period(&mut self, period: &DateRange) {
        self.closed_periods.retain(|p| p != period);
    }

    pub fn is_closed(&self, date: NaiveDate) -> bool {
        self.closed_periods.iter().any(|p| p.contains(date))
    }

    fn ensure_open(&self, date: NaiveDate) -> Result<(), FinanceError> {
        if self.is_closed(date) {
            return Err(FinanceError::PeriodClosed(date.to_string()));
        }
        Ok(())
    }

    fn index_of(&self, id: &FinancialEntryId) -> Result<usize, FinanceError> {
        self.entries
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| FinanceError::EntryNotFound(id.to_string()))
    }

    fn apply(&mut self, account_id: BankAccountId, kind: EntryKind, amount: Money) -> Result<(), FinanceError> {
        let allow_overdraft = self.allow_overdraft;
        let account = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| FinanceError::AccountNotFound(account_id.to_string()))?;
        if kind.is_inflow() {
            account.credit(amount)
        } else {
            account.debit(amount, allow_overdraft)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank_account::BankAccountKind;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn setup_ledger() -> (Ledger, BankAccountId) {
        let tenant = TenantId::new();
        let mut ledger = Ledger::new(tenant, Currency::BRL);
        let account = BankAccount::new(tenant, "Conta movimento", BankAccountKind::Checking, Money::brl(dec!(1000)));
        let id = account.id;
        ledger.add_account(account).unwrap();
        (ledger, id)
    }

    #[test]
    fn test_pending_entry_does_not_move_balance() {
        let (mut ledger, account) = setup_ledger();
        let entry = FinancialEntry::expense(
            ledger.tenant_id(),
            account,
            EntryCategory::Rent,
            "Aluguel",
            Money::brl(dec!(400)),
            date(5),
        )
        .unwrap();

        let id = ledger.record(entry).unwrap();
        assert_eq!(ledger.balance(&account).unwrap().amount(), dec!(1000));

        ledger.settle(&id, Utc::now()).unwrap();
        assert_eq!(ledger.balance(&account).unwrap().amount(), dec!(600));
    }

    #[test]
    fn test_settle_twice_fails() {
        let (mut ledger, account) = setup_ledger();
        let entry = FinancialEntry::income(
            ledger.tenant_id(),
            account,
            EntryCategory::Sales,
            "Venda",
            Money::brl(dec!(100)),
            date(5),
        )
        .unwrap();
        let id = ledger.record_settled(entry, Utc::now()).unwrap();

        assert!(matches!(
            ledger.settle(&id, Utc::now()),
            Err(FinanceError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_failed_settlement_leaves_no_entry() {
        let (mut ledger, account) = setup_ledger();
        let entry = FinancialEntry::expense(
            ledger.tenant_id(),
            account,
            EntryCategory::CostOfGoods,
            "Fornecedor",
            Money::brl(dec!(5000)),
            date(5),
        )
        .unwrap();

        assert!(ledger.record_settled(entry, Utc::now()).is_err());
        assert!(ledger.entries().is_empty());
    }
}
