//! Investment domain errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvestmentError {
    #[error("Invalid simulation input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    Calculation(String),
}
