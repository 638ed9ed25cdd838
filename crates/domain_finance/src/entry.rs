//! Financial entries
//!
//! An entry is a single movement on one bank account. Transfers are two
//! entries (TransferOut and TransferIn) linked through `transfer_pair`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{BankAccountId, FinancialEntryId, Money, TenantId};
use crate::error::FinanceError;

/// Direction of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Income,
    Expense,
    TransferIn,
    TransferOut,
}

impl EntryKind {
    /// Whether settling the entry increases the bank balance
    pub fn is_inflow(&self) -> bool {
        matches!(self, EntryKind::Income | EntryKind::TransferIn)
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, EntryKind::TransferIn | EntryKind::TransferOut)
    }

    /// The kind that undoes this one
    pub fn opposite(&self) -> EntryKind {
        match self {
            EntryKind::Income => EntryKind::Expense,
            EntryKind::Expense => EntryKind::Income,
            EntryKind::TransferIn => EntryKind::TransferOut,
            EntryKind::TransferOut => EntryKind::TransferIn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
            EntryKind::TransferIn => "transfer_in",
            EntryKind::TransferOut => "transfer_out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "income" => Some(EntryKind::Income),
            "expense" => Some(EntryKind::Expense),
            "transfer_in" => Some(EntryKind::TransferIn),
            "transfer_out" => Some(EntryKind::TransferOut),
            _ => None,
        }
    }
}

/// Line of the income statement a category rolls up into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DreLine {
    GrossRevenue,
    Deductions,
    CostOfGoods,
    OperatingExpenses,
    FinancialIncome,
    FinancialExpense,
    /// Not part of the result (transfers, investment movements)
    Excluded,
}

/// Chart of categories used by the tenant's ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    Sales,
    SalesReturns,
    SalesTaxes,
    CostOfGoods,
    Payroll,
    Rent,
    Utilities,
    Marketing,
    Administrative,
    Logistics,
    FinancialIncome,
    FinancialExpense,
    LateFees,
    Investments,
    Transfer,
    Other,
}

impl EntryCategory {
    pub const ALL: [EntryCategory; 16] = [
        EntryCategory::Sales,
        EntryCategory::SalesReturns,
        EntryCategory::SalesTaxes,
        EntryCategory::CostOfGoods,
        EntryCategory::Payroll,
        EntryCategory::Rent,
        EntryCategory::Utilities,
        EntryCategory::Marketing,
        EntryCategory::Administrative,
        EntryCategory::Logistics,
        EntryCategory::FinancialIncome,
        EntryCategory::FinancialExpense,
        EntryCategory::LateFees,
        EntryCategory::Investments,
        EntryCategory::Transfer,
        EntryCategory::Other,
    ];

    pub fn dre_line(&self) -> DreLine {
        match self {
            EntryCategory::Sales => DreLine::GrossRevenue,
            EntryCategory::SalesReturns | EntryCategory::SalesTaxes => DreLine::Deductions,
            EntryCategory::CostOfGoods => DreLine::CostOfGoods,
            EntryCategory::Payroll
            | EntryCategory::Rent
            | EntryCategory::Utilities
            | EntryCategory::Marketing
            | EntryCategory::Administrative
            | EntryCategory::Logistics
            | EntryCategory::Other => DreLine::OperatingExpenses,
            EntryCategory::FinancialIncome | EntryCategory::LateFees => DreLine::FinancialIncome,
            EntryCategory::FinancialExpense => DreLine::FinancialExpense,
            EntryCategory::Investments | EntryCategory::Transfer => DreLine::Excluded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryCategory::Sales => "sales",
            EntryCategory::SalesReturns => "sales_returns",
            EntryCategory::SalesTaxes => "sales_taxes",
            EntryCategory::CostOfGoods => "cost_of_goods",
            EntryCategory::Payroll => "payroll",
            EntryCategory::Rent => "rent",
            EntryCategory::Utilities => "utilities",
            EntryCategory::Marketing => "marketing",
            EntryCategory::Administrative => "administrative",
            EntryCategory::Logistics => "logistics",
            EntryCategory::FinancialIncome => "financial_income",
            EntryCategory::FinancialExpense => "financial_expense",
            EntryCategory::LateFees => "late_fees",
            EntryCategory::Investments => "investments",
            EntryCategory::Transfer => "transfer",
            EntryCategory::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// Entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Settled,
    Cancelled,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Settled => "SETTLED",
            EntryStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(EntryStatus::Pending),
            "SETTLED" => Some(EntryStatus::Settled),
            "CANCELLED" => Some(EntryStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A movement on a bank account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialEntry {
    pub id: FinancialEntryId,
    pub tenant_id: TenantId,
    pub bank_account_id: BankAccountId,
    pub kind: EntryKind,
    pub category: EntryCategory,
    pub description: String,
    /// Always positive; direction comes from `kind`
    pub amount: Money,
    /// Date the movement belongs to for closings and the DRE
    pub competence_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub settled_at: Option<DateTime<Utc>>,
    pub status: EntryStatus,
    /// Reference type (e.g., "boleto", "payroll")
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub transfer_pair: Option<FinancialEntryId>,
    pub reversal_of: Option<FinancialEntryId>,
    pub reversed_by: Option<FinancialEntryId>,
    pub created_at: DateTime<Utc>,
}

impl FinancialEntry {
    pub fn new(
        tenant_id: TenantId,
        bank_account_id: BankAccountId,
        kind: EntryKind,
        category: EntryCategory,
        description: impl Into<String>,
        amount: Money,
        competence_date: NaiveDate,
    ) -> Result<Self, FinanceError> {
        if !amount.is_positive() {
            return Err(FinanceError::InvalidAmount(format!(
                "entry amount must be positive, got {amount}"
            )));
        }
        Ok(Self {
            id: FinancialEntryId::new_v7(),
            tenant_id,
            bank_account_id,
            kind,
            category,
            description: description.into(),
            amount: amount.round_to_currency(),
            competence_date,
            due_date: None,
            settled_at: None,
            status: EntryStatus::Pending,
            reference_type: None,
            reference_id: None,
            transfer_pair: None,
            reversal_of: None,
            reversed_by: None,
            created_at: Utc::now(),
        })
    }

    pub fn income(
        tenant_id: TenantId,
        bank_account_id: BankAccountId,
        category: EntryCategory,
        description: impl Into<String>,
        amount: Money,
        competence_date: NaiveDate,
    ) -> Result<Self, FinanceError> {
        Self::new(tenant_id, bank_account_id, EntryKind::Income, category, description, amount, competence_date)
    }

    pub fn expense(
        tenant_id: TenantId,
        bank_account_id: BankAccountId,
        category: EntryCategory,
        description: impl Into<String>,
        amount: Money,
        competence_date: NaiveDate,
    ) -> Result<Self, FinanceError> {
        Self::new(tenant_id, bank_account_id, EntryKind::Expense, category, description, amount, competence_date)
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_reference(mut self, ref_type: impl Into<String>, ref_id: Uuid) -> Self {
        self.reference_type = Some(ref_type.into());
        self.reference_id = Some(ref_id);
        self
    }

    /// Amount with the sign it has on the bank balance
    pub fn signed_amount(&self) -> Money {
        if self.kind.is_inflow() {
            self.amount
        } else {
            -self.amount
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status == EntryStatus::Settled
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed_by.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_category_roundtrip_and_dre_line() {
        for category in EntryCategory::ALL {
            assert_eq!(EntryCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(EntryCategory::LateFees.dre_line(), DreLine::FinancialIncome);
        assert_eq!(EntryCategory::Transfer.dre_line(), DreLine::Excluded);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let result = FinancialEntry::income(
            TenantId::new(),
            BankAccountId::new(),
            EntryCategory::Sales,
            "venda",
            Money::brl(dec!(0)),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        );
        assert!(matches!(result, Err(FinanceError::InvalidAmount(_))));
    }
}
