//! Employees

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Cpf, DateRange, EmployeeId, Money, TenantId};

/// A CLT employee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub tenant_id: TenantId,
    pub name: String,
    pub cpf: Cpf,
    /// Job title, e.g. "Operador de caixa"
    pub role: String,
    pub base_salary: Money,
    pub hire_date: NaiveDate,
    pub termination_date: Option<NaiveDate>,
    /// Dependents declared for IRRF
    pub dependents: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        cpf: Cpf,
        role: impl Into<String>,
        base_salary: Money,
        hire_date: NaiveDate,
    ) -> Self {
        Self {
            id: EmployeeId::new_v7(),
            tenant_id,
            name: name.into(),
            cpf,
            role: role.into(),
            base_salary,
            hire_date,
            termination_date: None,
            dependents: 0,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_dependents(mut self, dependents: u32) -> Self {
        self.dependents = dependents;
        self
    }

    pub fn terminate(&mut self, date: NaiveDate) {
        self.termination_date = Some(date);
        self.active = false;
    }

    /// Part of `range` during which the employee was on the payroll
    pub fn employed_within(&self, range: &DateRange) -> Option<DateRange> {
        let start = self.hire_date.max(range.start);
        let end = match self.termination_date {
            Some(t) => t.min(range.end),
            None => range.end,
        };
        DateRange::new(start, end).ok()
    }

    /// Days worked in a month on the 30-day commercial calendar
    pub fn commercial_days_in(&self, month: &DateRange) -> u32 {
        match self.employed_within(month) {
            Some(worked) if worked == *month => 30,
            Some(worked) => {
                // Working through the 31st still counts as the 30th
                let end = if worked.end == month.end { 30 } else { worked.end.day().min(30) };
                let start = worked.start.day().min(30);
                end.saturating_sub(start) + 1
            }
            None => 0,
        }
    }
}
