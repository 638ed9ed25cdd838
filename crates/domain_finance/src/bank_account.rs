//! Bank accounts and cash drawers
//!
//! The balance held here is the running total of settled entries. It is only
//! changed through [`BankAccount::credit`] and [`BankAccount::debit`], which
//! the ledger calls when an entry settles.

use serde::{Deserialize, Serialize};

use core_kernel::{BankAccountId, Currency, Money, TenantId};
use crate::error::FinanceError;

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankAccountKind {
    Checking,
    Savings,
    /// Physical cash drawer
    Cash,
    /// Card acquirers and Pix providers holding settlement balances
    PaymentProvider,
}

impl BankAccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankAccountKind::Checking => "checking",
            BankAccountKind::Savings => "savings",
            BankAccountKind::Cash => "cash",
            BankAccountKind::PaymentProvider => "payment_provider",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "checking" => Some(BankAccountKind::Checking),
            "savings" => Some(BankAccountKind::Savings),
            "cash" => Some(BankAccountKind::Cash),
            "payment_provider" => Some(BankAccountKind::PaymentProvider),
            _ => None,
        }
    }

    /// Cash can never be negative
    pub fn can_go_negative(&self) -> bool {
        !matches!(self, BankAccountKind::Cash)
    }
}

/// A tenant's bank account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: BankAccountId,
    pub tenant_id: TenantId,
    pub name: String,
    /// FEBRABAN bank code, e.g. "237"
    pub bank_code: String,
    pub agency: String,
    pub number: String,
    pub kind: BankAccountKind,
    pub balance: Money,
    pub active: bool,
}

impl BankAccount {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        kind: BankAccountKind,
        opening_balance: Money,
    ) -> Self {
        Self {
            id: BankAccountId::new_v7(),
            tenant_id,
            name: name.into(),
            bank_code: String::new(),
            agency: String::new(),
            number: String::new(),
            kind,
            balance: opening_balance,
            active: true,
        }
    }

    /// Sets the bank coordinates used on boletos
    pub fn with_bank(
        mut self,
        bank_code: impl Into<String>,
        agency: impl Into<String>,
        number: impl Into<String>,
    ) -> Self {
        self.bank_code = bank_code.into();
        self.agency = agency.into();
        self.number = number.into();
        self
    }

    pub fn currency(&self) -> Currency {
        self.balance.currency()
    }

    pub fn credit(&mut self, amount: Money) -> Result<(), FinanceError> {
        if amount.is_negative() {
            return Err(FinanceError::InvalidAmount(format!("credit of {amount}")));
        }
        self.balance = self.balance.checked_add(&amount)?;
        Ok(())
    }

    /// Withdraws from the account
    ///
    /// Cash accounts reject any debit that would leave them negative,
    /// regardless of `allow_negative`.
    pub fn debit(&mut self, amount: Money, allow_negative: bool) -> Result<(), FinanceError> {
        if amount.is_negative() {
            return Err(FinanceError::InvalidAmount(format!("debit of {amount}")));
        }
        let next = self.balance.checked_sub(&amount)?;
        if next.is_negative() && !(allow_negative && self.kind.can_go_negative()) {
            return Err(FinanceError::InsufficientFunds(self.name.clone()));
        }
        self.balance = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cash_never_negative() {
        let mut drawer = BankAccount::new(
            TenantId::new(),
            "Caixa",
            BankAccountKind::Cash,
            Money::brl(dec!(50)),
        );
        let result = drawer.debit(Money::brl(dec!(60)), true);

        assert!(matches!(result, Err(FinanceError::InsufficientFunds(_))));
        assert_eq!(drawer.balance.amount(), dec!(50));
    }

    #[test]
    fn test_checking_overdraft_when_allowed() {
        let mut account = BankAccount::new(
            TenantId::new(),
            "Bradesco",
            BankAccountKind::Checking,
            Money::brl(dec!(50)),
        );
        assert!(account.debit(Money::brl(dec!(60)), false).is_err());
        account.debit(Money::brl(dec!(60)), true).unwrap();
        assert_eq!(account.balance.amount(), dec!(-10));
    }
}
