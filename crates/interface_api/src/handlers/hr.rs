//! Employee and payroll handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Utc};
use tracing::info;
use validator::Validate;

use core_kernel::{BankAccountId, Cpf, DateRange, EmployeeId, Money, PayrollId, Role};
use domain_hr::{Employee, PayrollInput, PayrollRun};

use crate::auth::Caller;
use crate::dto::hr::*;
use crate::error::ApiError;
use crate::AppState;

pub async fn create_employee(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateEmployeeRequest>,
) -> Result<(StatusCode, Json<Employee>), ApiError> {
    caller.require(Role::Hr)?;
    request.validate()?;

    let employee = Employee::new(
        caller.tenant_id(),
        request.name.trim(),
        Cpf::parse(&request.cpf)?,
        request.role.trim(),
        Money::brl(request.base_salary),
        request.hire_date,
    )
    .with_dependents(request.dependents.unwrap_or(0));

    state.hr.insert_employee(&employee).await?;
    info!(employee = %employee.id, "employee hired");
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn list_employees(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<EmployeeQuery>,
) -> Result<Json<Vec<Employee>>, ApiError> {
    caller.require(Role::Hr)?;
    let active_only = query.active_only.unwrap_or(true);
    Ok(Json(state.hr.list_employees(caller.tenant_id(), active_only).await?))
}

pub async fn get_employee(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<EmployeeId>,
) -> Result<Json<Employee>, ApiError> {
    caller.require(Role::Hr)?;
    Ok(Json(state.hr.find_employee(caller.tenant_id(), id).await?))
}

pub async fn terminate_employee(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<EmployeeId>,
    Json(request): Json<TerminateEmployeeRequest>,
) -> Result<Json<Employee>, ApiError> {
    caller.require(Role::Hr)?;
    let mut employee = state.hr.find_employee(caller.tenant_id(), id).await?;
    if !employee.active {
        return Err(ApiError::Conflict(format!("employee {} is already terminated", employee.id)));
    }
    if request.date < employee.hire_date {
        return Err(ApiError::validation("termination date precedes the hire date"));
    }
    employee.terminate(request.date);
    state.hr.update_employee(&employee).await?;
    info!(employee = %employee.id, date = %request.date, "employee terminated");
    Ok(Json(employee))
}

/// Computes a draft payroll for the reference month
///
/// Everyone employed at some point in the month is included, pro rata;
/// adjustments carry the month's overtime, commissions and deductions.
pub async fn prepare_payroll(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<PreparePayrollRequest>,
) -> Result<(StatusCode, Json<PayrollRun>), ApiError> {
    caller.require(Role::Hr)?;
    request.validate()?;
    let tenant_id = caller.tenant_id();
    let month = DateRange::month(request.reference.year(), request.reference.month())?;

    let employees = state.hr.employees_for_period(tenant_id, &month).await?;
    if let Some(unknown) = request
        .adjustments
        .iter()
        .find(|a| !employees.iter().any(|e| *e.id.as_uuid() == a.employee_id))
    {
        return Err(ApiError::validation(format!(
            "employee {} is not on the payroll for {}",
            unknown.employee_id,
            month.start.format("%Y-%m")
        )));
    }

    let inputs: Vec<PayrollInput> = employees
        .into_iter()
        .map(|employee| {
            let mut input = PayrollInput::new(employee, request.reference);
            if let Some(adj) = request.adjustments.iter().find(|a| a.employee_id == *input.employee.id.as_uuid()) {
                if let Some(hours) = adj.overtime_hours {
                    input.overtime_hours = hours;
                }
                if let Some(value) = adj.commissions {
                    input.commissions = Money::brl(value);
                }
                if let Some(value) = adj.advances {
                    input.advances = Money::brl(value);
                }
                if let Some(value) = adj.other_deductions {
                    input.other_deductions = Money::brl(value);
                }
            }
            input
        })
        .collect();

    let run = PayrollRun::prepare(tenant_id, request.reference, &inputs, &state.services.payroll_tables)?;
    state.hr.insert_payroll(&run).await?;
    info!(payroll = %run.id, payslips = run.payslips.len(), net = %run.total_net(), "payroll prepared");
    Ok((StatusCode::CREATED, Json(run)))
}

pub async fn list_payrolls(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<PayrollRun>>, ApiError> {
    caller.require(Role::Hr)?;
    Ok(Json(state.hr.list_payrolls(caller.tenant_id()).await?))
}

pub async fn get_payroll(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<PayrollId>,
) -> Result<Json<PayrollRun>, ApiError> {
    caller.require(Role::Hr)?;
    Ok(Json(state.hr.find_payroll(caller.tenant_id(), id).await?))
}

pub async fn approve_payroll(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<PayrollId>,
) -> Result<Json<PayrollRun>, ApiError> {
    caller.require(Role::Hr)?;
    let run = state
        .hr
        .approve_payroll(caller.tenant_id(), id, caller.user_id(), Utc::now())
        .await?;
    Ok(Json(run))
}

/// Pays an approved run; the net salaries become settled payroll expenses
pub async fn pay_payroll(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<PayrollId>,
    Json(request): Json<PayPayrollRequest>,
) -> Result<Json<PaidPayrollResponse>, ApiError> {
    caller.require(Role::Finance)?;
    let (run, entries) = state
        .hr
        .pay_payroll(caller.tenant_id(), id, BankAccountId::from_uuid(request.bank_account_id), Utc::now())
        .await?;
    Ok(Json(PaidPayrollResponse { run, entries }))
}
