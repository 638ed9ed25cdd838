//! Finance domain errors

use thiserror::Error;

use core_kernel::{Money, MoneyError, TemporalError};

/// Errors that can occur in the finance domain
#[derive(Debug, Error)]
pub enum FinanceError {
    /// Bank account not found
    #[error("Bank account not found: {0}")]
    AccountNotFound(String),

    /// Bank account already registered
    #[error("Bank account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Bank account is inactive: {0}")]
    InactiveAccount(String),

    /// Financial entry not found
    #[error("Financial entry not found: {0}")]
    EntryNotFound(String),

    /// State machine violation
    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Not enough balance in an account that cannot go negative
    #[error("Insufficient funds in account: {0}")]
    InsufficientFunds(String),

    #[error("Payment of {attempted} exceeds outstanding {outstanding}")]
    Overpayment {
        outstanding: Money,
        attempted: Money,
    },

    #[error("Payment of {offered} is below the amount due {due}")]
    Underpayment {
        due: Money,
        offered: Money,
    },

    /// The competence date falls in a closed period
    #[error("Period is closed: {0}")]
    PeriodClosed(String),

    #[error("Period overlaps an existing closing: {0}")]
    OverlappingPeriod(String),

    #[error("{0} pending entries are due inside the period")]
    PendingEntriesInPeriod(usize),

    /// Barcode or digitable line could not be produced or parsed
    #[error("Invalid boleto data: {0}")]
    InvalidBoletoData(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),
}

impl FinanceError {
    pub(crate) fn transition(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        FinanceError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
