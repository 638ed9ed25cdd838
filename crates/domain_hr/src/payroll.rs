//! Payroll computation and runs

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use core_kernel::{BankAccountId, Currency, DateRange, EmployeeId, Money, PayrollId, TenantId, UserId};
use domain_finance::{EntryCategory, FinancialEntry};
use crate::employee::Employee;
use crate::error::HrError;
use crate::tables::PayrollTables;

/// Variable items of one employee's month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollInput {
    pub employee: Employee,
    /// Any day of the reference month
    pub reference: NaiveDate,
    pub overtime_hours: Decimal,
    pub commissions: Money,
    /// Salary advances (vales) already paid during the month
    pub advances: Money,
    pub other_deductions: Money,
}

impl PayrollInput {
    pub fn new(employee: Employee, reference: NaiveDate) -> Self {
        let zero = Money::zero(employee.base_salary.currency());
        Self {
            employee,
            reference,
            overtime_hours: Decimal::ZERO,
            commissions: zero,
            advances: zero,
            other_deductions: zero,
        }
    }
}

/// One employee's monthly statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payslip {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub period: DateRange,
    pub days_worked: u32,
    pub base_pay: Money,
    pub overtime_pay: Money,
    pub commissions: Money,
    pub gross: Money,
    pub inss: Money,
    pub irrf: Money,
    /// Employer deposit, not deducted from net
    pub fgts: Money,
    pub advances: Money,
    pub other_deductions: Money,
    pub net: Money,
}

fn month_of(date: NaiveDate) -> Result<DateRange, HrError> {
    DateRange::month(date.year(), date.month())
        .map_err(|e| HrError::InvalidInput(e.to_string()))
}

/// Computes a payslip
pub fn compute_payroll(input: &PayrollInput, tables: &PayrollTables) -> Result<Payslip, HrError> {
    let employee = &input.employee;
    let currency = employee.base_salary.currency();
    let period = month_of(input.reference)?;
    if input.overtime_hours < Decimal::ZERO {
        return Err(HrError::InvalidInput("overtime hours cannot be negative".to_string()));
    }

    let days_worked = employee.commercial_days_in(&period);
    if days_worked == 0 {
        return Err(HrError::NotEmployed(
            employee.name.clone(),
            format!("{:04}-{:02}", period.start.year(), period.start.month()),
        ));
    }

    let base = employee.base_salary.amount();
    let base_pay = (base * Decimal::from(days_worked) / Decimal::from(30)).round_dp(2);
    let hourly = base / tables.monthly_hours;
    let overtime_pay = (hourly * tables.overtime_multiplier * input.overtime_hours).round_dp(2);
    let gross = base_pay + overtime_pay + input.commissions.amount();

    let inss = tables.inss(gross);
    let irrf_base = gross - inss - tables.dependent_deduction * Decimal::from(employee.dependents);
    let irrf = tables.irrf(irrf_base.max(Decimal::ZERO));
    let fgts = (gross * tables.fgts_rate.as_decimal()).round_dp(2);
    let net = gross - inss - irrf - input.advances.amount() - input.other_deductions.amount();

    let money = |v: Decimal| Money::new(v, currency);
    Ok(Payslip {
        employee_id: employee.id,
        employee_name: employee.name.clone(),
        period,
        days_worked,
        base_pay: money(base_pay),
        overtime_pay: money(overtime_pay),
        commissions: input.commissions,
        gross: money(gross),
        inss: money(inss),
        irrf: money(irrf),
        fgts: money(fgts),
        advances: input.advances,
        other_deductions: input.other_deductions,
        net: money(net),
    })
}

/// Gratificação natalina: base × months worked / 12
///
/// A month counts when the employee worked at least 15 days in it.
pub fn thirteenth_salary(employee: &Employee, year: i32) -> Result<Money, HrError> {
    let mut months = 0u32;
    for month in 1..=12 {
        let range = DateRange::month(year, month).map_err(|e| HrError::InvalidInput(e.to_string()))?;
        if let Some(worked) = employee.employed_within(&range) {
            if worked.days() >= 15 {
                months += 1;
            }
        }
    }
    let amount = employee.base_salary.amount() * Decimal::from(months) / Decimal::from(12);
    Ok(Money::new(amount, employee.base_salary.currency()).round_to_currency())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayrollStatus {
    Draft,
    Approved,
    Paid,
}

impl PayrollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollStatus::Draft => "DRAFT",
            PayrollStatus::Approved => "APPROVED",
            PayrollStatus::Paid => "PAID",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(PayrollStatus::Draft),
            "APPROVED" => Some(PayrollStatus::Approved),
            "PAID" => Some(PayrollStatus::Paid),
            _ => None,
        }
    }
}

/// A month's payroll for a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollRun {
    pub id: PayrollId,
    pub tenant_id: TenantId,
    pub period: DateRange,
    pub payslips: Vec<Payslip>,
    pub status: PayrollStatus,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PayrollRun {
    /// Computes payslips for every employee on the payroll during the month
    ///
    /// Employees not employed in the month are skipped.
    pub fn prepare(
        tenant_id: TenantId,
        reference: NaiveDate,
        inputs: &[PayrollInput],
        tables: &PayrollTables,
    ) -> Result<Self, HrError> {
        let period = month_of(reference)?;
        let mut payslips = Vec::with_capacity(inputs.len());
        for input in inputs {
            if input.employee.tenant_id != tenant_id {
                return Err(HrError::InvalidInput(format!(
                    "employee {} belongs to another tenant",
                    input.employee.id
                )));
            }
            match compute_payroll(input, tables) {
                Ok(slip) => payslips.push(slip),
                Err(HrError::NotEmployed(..)) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            id: PayrollId::new_v7(),
            tenant_id,
            period,
            payslips,
            status: PayrollStatus::Draft,
            approved_by: None,
            approved_at: None,
            paid_at: None,
            created_at: Utc::now(),
        })
    }

    pub fn total_net(&self) -> Money {
        let currency = self.payslips.first().map(|p| p.net.currency()).unwrap_or(Currency::BRL);
        self.payslips
            .iter()
            .fold(Money::zero(currency), |acc, p| acc + p.net)
    }

    pub fn total_gross(&self) -> Money {
        let currency = self.payslips.first().map(|p| p.gross.currency()).unwrap_or(Currency::BRL);
        self.payslips
            .iter()
            .fold(Money::zero(currency), |acc, p| acc + p.gross)
    }

    pub fn approve(&mut self, by: UserId, at: DateTime<Utc>) -> Result<(), HrError> {
        if self.status != PayrollStatus::Draft {
            return Err(self.invalid(PayrollStatus::Approved));
        }
        if self.payslips.is_empty() {
            return Err(HrError::InvalidInput("payroll has no payslips".to_string()));
        }
        self.status = PayrollStatus::Approved;
        self.approved_by = Some(by);
        self.approved_at = Some(at);
        Ok(())
    }

    /// Marks the run paid and returns the ledger entries to settle
    ///
    /// One Payroll expense per payslip, for the net amount, dated on the
    /// last day of the reference month.
    pub fn pay(&mut self, account: BankAccountId, at: DateTime<Utc>) -> Result<Vec<FinancialEntry>, HrError> {
        if self.status != PayrollStatus::Approved {
            return Err(self.invalid(PayrollStatus::Paid));
        }
        let reference = *self.id.as_uuid();
        let entries = self
            .payslips
            .iter()
            .filter(|p| p.net.is_positive())
            .map(|p| {
                FinancialEntry::expense(
                    self.tenant_id,
                    account,
                    EntryCategory::Payroll,
                    format!("Salário {} {}", p.employee_name, self.period.start.format("%m/%Y")),
                    p.net,
                    self.period.end,
                )
                .map(|e| e.with_reference("payroll", reference))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.status = PayrollStatus::Paid;
        self.paid_at = Some(at);
        info!(payroll = %self.id, payslips = self.payslips.len(), total = %self.total_net(), "payroll paid");
        Ok(entries)
    }

    fn invalid(&self, to: PayrollStatus) -> HrError {
        HrError::InvalidTransition {
            from: self.status.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }
}
