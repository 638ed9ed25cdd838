//! Employees and payroll

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_finance::FinancialEntry;
use domain_hr::PayrollRun;

use super::{non_negative, positive};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 11, max = 14))]
    pub cpf: String,
    /// Job title
    #[validate(length(min = 1, max = 100))]
    pub role: String,
    #[validate(custom(function = "positive"))]
    pub base_salary: Decimal,
    pub hire_date: NaiveDate,
    #[validate(range(max = 20))]
    pub dependents: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeQuery {
    pub active_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TerminateEmployeeRequest {
    pub date: NaiveDate,
}

/// Month-specific amounts for one employee
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PayrollAdjustment {
    pub employee_id: Uuid,
    #[validate(custom(function = "non_negative"))]
    pub overtime_hours: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub commissions: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub advances: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub other_deductions: Option<Decimal>,
}

/// Prepares the run of the month containing `reference` for everyone employed in it
#[derive(Debug, Deserialize, Validate)]
pub struct PreparePayrollRequest {
    pub reference: NaiveDate,
    #[serde(default)]
    #[validate(nested)]
    pub adjustments: Vec<PayrollAdjustment>,
}

#[derive(Debug, Deserialize)]
pub struct PayPayrollRequest {
    pub bank_account_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaidPayrollResponse {
    pub run: PayrollRun,
    pub entries: Vec<FinancialEntry>,
}
