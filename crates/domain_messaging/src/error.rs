//! Messaging domain errors

use thiserror::Error;

use core_kernel::PortError;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidWebhook(String),

    #[error("Invalid message transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("Gateway error: {0}")]
    Port(#[from] PortError),
}
