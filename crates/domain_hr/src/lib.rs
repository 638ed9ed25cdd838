//! HR Domain - Employees and payroll
//!
//! Payroll follows the CLT rules used by small Brazilian retailers:
//! - INSS withheld progressively by bracket
//! - IRRF on the salary after INSS and dependent deductions
//! - FGTS deposited by the employer (8%), not deducted from the employee
//! - overtime at 150% of the hourly rate (base / 220)
//!
//! A [`PayrollRun`] moves Draft → Approved → Paid; paying it yields one
//! Payroll expense entry per payslip for the finance ledger.

pub mod employee;
pub mod tables;
pub mod payroll;
pub mod error;

pub use employee::Employee;
pub use tables::{IrrfBracket, InssBracket, PayrollTables};
pub use payroll::{
    compute_payroll, thirteenth_salary, PayrollInput, PayrollRun, PayrollStatus, Payslip,
};
pub use error::HrError;
