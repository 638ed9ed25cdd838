//! HR domain errors

use thiserror::Error;

use core_kernel::MoneyError;
use domain_finance::FinanceError;

#[derive(Debug, Error)]
pub enum HrError {
    #[error("Employee is inactive: {0}")]
    InactiveEmployee(String),

    #[error("Employee {0} was not employed during {1}")]
    NotEmployed(String, String),

    #[error("Invalid payroll transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Finance error: {0}")]
    Finance(#[from] FinanceError),
}
