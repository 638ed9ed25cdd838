//! Employees and payroll runs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use core_kernel::{BankAccountId, Cpf, DateRange, EmployeeId, PayrollId, TenantId, UserId};
use domain_finance::FinancialEntry;
use domain_hr::{Employee, PayrollRun, PayrollStatus, Payslip};

use super::finance::FinanceRepository;
use super::{column, currency, money, to_u32};
use crate::error::DatabaseError;

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    cpf: String,
    role: String,
    base_salary: Decimal,
    currency: String,
    hire_date: NaiveDate,
    termination_date: Option<NaiveDate>,
    dependents: i32,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = DatabaseError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee {
            id: EmployeeId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            cpf: Cpf::parse(&row.cpf).map_err(|_| DatabaseError::invalid_value("cpf", &row.cpf))?,
            role: row.role,
            base_salary: money(row.base_salary, currency(&row.currency)?),
            hire_date: row.hire_date,
            termination_date: row.termination_date,
            dependents: to_u32("dependents", row.dependents)?,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PayrollRow {
    id: Uuid,
    tenant_id: Uuid,
    period_start: NaiveDate,
    period_end: NaiveDate,
    payslips: sqlx::types::Json<Vec<Payslip>>,
    status: String,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PayrollRow> for PayrollRun {
    type Error = DatabaseError;

    fn try_from(row: PayrollRow) -> Result<Self, Self::Error> {
        Ok(PayrollRun {
            id: PayrollId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            period: DateRange::new(row.period_start, row.period_end)
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?,
            payslips: row.payslips.0,
            status: column("status", &row.status, PayrollStatus::parse)?,
            approved_by: row.approved_by.map(UserId::from_uuid),
            approved_at: row.approved_at,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

const EMPLOYEE_COLUMNS: &str = "id, tenant_id, name, cpf, role, base_salary, currency, hire_date, \
     termination_date, dependents, active, created_at";

const PAYROLL_COLUMNS: &str =
    "id, tenant_id, period_start, period_end, payslips, status, approved_by, approved_at, paid_at, created_at";

/// Repository for employees and payroll runs
#[derive(Debug, Clone)]
pub struct HrRepository {
    pool: PgPool,
    finance: FinanceRepository,
}

impl HrRepository {
    pub fn new(pool: PgPool) -> Self {
        let finance = FinanceRepository::new(pool.clone());
        Self { pool, finance }
    }

    /// Uses the given finance repository (and its overdraft policy) for payouts
    pub fn with_finance(mut self, finance: FinanceRepository) -> Self {
        self.finance = finance;
        self
    }

    // ------------------------------------------------------------------
    // Employees
    // ------------------------------------------------------------------

    pub async fn insert_employee(&self, employee: &Employee) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO employees (
                id, tenant_id, name, cpf, role, base_salary, currency, hire_date,
                termination_date, dependents, active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(*employee.id.as_uuid())
        .bind(*employee.tenant_id.as_uuid())
        .bind(&employee.name)
        .bind(employee.cpf.digits())
        .bind(&employee.role)
        .bind(employee.base_salary.amount())
        .bind(employee.base_salary.currency().code())
        .bind(employee.hire_date)
        .bind(employee.termination_date)
        .bind(employee.dependents as i32)
        .bind(employee.active)
        .bind(employee.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Employee", "cpf", employee.cpf.digits()),
            other => other,
        })?;
        Ok(())
    }

    pub async fn update_employee(&self, employee: &Employee) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE employees SET
                name = $3, role = $4, base_salary = $5, termination_date = $6,
                dependents = $7, active = $8
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(*employee.tenant_id.as_uuid())
        .bind(*employee.id.as_uuid())
        .bind(&employee.name)
        .bind(&employee.role)
        .bind(employee.base_salary.amount())
        .bind(employee.termination_date)
        .bind(employee.dependents as i32)
        .bind(employee.active)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Employee", employee.id));
        }
        Ok(())
    }

    pub async fn find_employee(&self, tenant_id: TenantId, id: EmployeeId) -> Result<Employee, DatabaseError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Employee", id))?
            .try_into()
    }

    /// Employees on the books at some point of the period
    pub async fn employees_for_period(
        &self,
        tenant_id: TenantId,
        period: &DateRange,
    ) -> Result<Vec<Employee>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {EMPLOYEE_COLUMNS} FROM employees
            WHERE tenant_id = $1
              AND hire_date <= $3
              AND (termination_date IS NULL OR termination_date >= $2)
            ORDER BY name
            "#
        );
        sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(period.start)
            .bind(period.end)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Employee::try_from)
            .collect()
    }

    pub async fn list_employees(&self, tenant_id: TenantId, active_only: bool) -> Result<Vec<Employee>, DatabaseError> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE tenant_id = $1 AND ($2 = FALSE OR active) ORDER BY name"
        );
        sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Employee::try_from)
            .collect()
    }

    // ------------------------------------------------------------------
    // Payroll runs
    // ------------------------------------------------------------------

    /// Stores a freshly prepared run; one run per tenant and month
    pub async fn insert_payroll(&self, run: &PayrollRun) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payroll_runs (
                id, tenant_id, period_start, period_end, payslips, status,
                approved_by, approved_at, paid_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*run.id.as_uuid())
        .bind(*run.tenant_id.as_uuid())
        .bind(run.period.start)
        .bind(run.period.end)
        .bind(sqlx::types::Json(&run.payslips))
        .bind(run.status.as_str())
        .bind(run.approved_by.map(|u| *u.as_uuid()))
        .bind(run.approved_at)
        .bind(run.paid_at)
        .bind(run.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("Payroll", "period", run.period.start.format("%m/%Y"))
            }
            other => other,
        })?;
        info!(payroll = %run.id, payslips = run.payslips.len(), "payroll prepared");
        Ok(())
    }

    pub async fn find_payroll(&self, tenant_id: TenantId, id: PayrollId) -> Result<PayrollRun, DatabaseError> {
        let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll_runs WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Payroll", id))?
            .try_into()
    }

    pub async fn list_payrolls(&self, tenant_id: TenantId) -> Result<Vec<PayrollRun>, DatabaseError> {
        let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll_runs WHERE tenant_id = $1 ORDER BY period_start DESC");
        sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PayrollRun::try_from)
            .collect()
    }

    pub async fn approve_payroll(
        &self,
        tenant_id: TenantId,
        id: PayrollId,
        by: UserId,
        at: DateTime<Utc>,
    ) -> Result<PayrollRun, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut run = lock_payroll(&mut *tx, tenant_id, id).await?;
        run.approve(by, at)?;
        update_payroll_in(&mut *tx, &run).await?;
        tx.commit().await?;
        info!(payroll = %run.id, by = %by, "payroll approved");
        Ok(run)
    }

    /// Pays an approved run from `account`
    ///
    /// The run's status and its Payroll expenses are written in the same
    /// transaction, so a failed debit leaves the run Approved.
    #[instrument(skip(self))]
    pub async fn pay_payroll(
        &self,
        tenant_id: TenantId,
        id: PayrollId,
        account: BankAccountId,
        at: DateTime<Utc>,
    ) -> Result<(PayrollRun, Vec<FinancialEntry>), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut run = lock_payroll(&mut *tx, tenant_id, id).await?;
        let entries = run.pay(account, at)?;
        let recorded = self.finance.record_settled_in(&mut *tx, tenant_id, entries, at).await?;
        update_payroll_in(&mut *tx, &run).await?;
        tx.commit().await?;
        Ok((run, recorded))
    }
}

async fn lock_payroll(conn: &mut PgConnection, tenant_id: TenantId, id: PayrollId) -> Result<PayrollRun, DatabaseError> {
    let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll_runs WHERE tenant_id = $1 AND id = $2 FOR UPDATE");
    sqlx::query_as::<_, PayrollRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Payroll", id))?
        .try_into()
}

async fn update_payroll_in(conn: &mut PgConnection, run: &PayrollRun) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE payroll_runs SET
            status = $3, approved_by = $4, approved_at = $5, paid_at = $6
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(*run.tenant_id.as_uuid())
    .bind(*run.id.as_uuid())
    .bind(run.status.as_str())
    .bind(run.approved_by.map(|u| *u.as_uuid()))
    .bind(run.approved_at)
    .bind(run.paid_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
