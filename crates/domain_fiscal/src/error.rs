//! Fiscal domain errors

use thiserror::Error;

use core_kernel::{DocumentError, MoneyError, PortError};

#[derive(Debug, Error)]
pub enum FiscalError {
    #[error("Invalid access key: {0}")]
    InvalidAccessKey(String),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Invoice has no items")]
    EmptyInvoice,

    #[error("NF-e requires the recipient's CPF or CNPJ")]
    MissingRecipient,

    #[error("Invalid invoice transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("Cancellation reason must have at least 15 characters")]
    ReasonTooShort,

    #[error("Cancellation window of 24 hours has expired")]
    CancellationWindowExpired,

    #[error("Rejected by the tax authority ({code}): {reason}")]
    Rejected {
        code: u16,
        reason: String,
    },

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Authorizer error: {0}")]
    Port(#[from] PortError),
}
