//! Receivable and boleto handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use validator::Validate;

use core_kernel::{BankAccountId, BoletoId, CustomerId, Money, ReceivableId, Role};
use domain_finance::{Boleto, BoletoStatus, Receivable, ReceivableStatus, SweepReport};
use domain_messaging::MessageTemplate;

use crate::auth::Caller;
use crate::dto::finance::*;
use crate::dto::{parse_filter, ListQuery, ReasonRequest};
use crate::error::ApiError;
use crate::notifications::notify_customer;
use crate::AppState;

pub async fn list_receivables(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ReceivableQuery>,
) -> Result<Json<Vec<Receivable>>, ApiError> {
    caller.require(Role::Finance)?;
    let status = parse_filter(query.status.as_deref(), "receivable status", ReceivableStatus::parse)?;
    let customer = query.customer_id.map(CustomerId::from_uuid);
    Ok(Json(state.finance.list_receivables(caller.tenant_id(), status, customer).await?))
}

pub async fn get_receivable(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ReceivableId>,
) -> Result<Json<Receivable>, ApiError> {
    caller.require(Role::Finance)?;
    Ok(Json(state.finance.find_receivable(caller.tenant_id(), id).await?))
}

/// Registers money received directly against a receivable (no boleto)
pub async fn register_payment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ReceivableId>,
    Json(request): Json<ReceivablePaymentRequest>,
) -> Result<Json<Receivable>, ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    let tenant_id = caller.tenant_id();
    let (tenant, _) = state.tenant_rules(tenant_id).await?;

    let amount = Money::brl(request.amount);
    let receivable = state
        .finance
        .register_receivable_payment(
            tenant_id,
            id,
            BankAccountId::from_uuid(request.bank_account_id),
            amount,
            Money::brl(request.charges.unwrap_or(Decimal::ZERO)),
            request.paid_at.unwrap_or_else(Utc::now),
            &tenant.timezone(),
        )
        .await?;

    let reference = receivable.description.clone();
    notify_customer(&state, tenant_id, receivable.customer_id, move |customer| {
        MessageTemplate::PaymentReceived {
            customer_name: customer.name.clone(),
            amount,
            reference,
        }
    });
    Ok(Json(receivable))
}

pub async fn cancel_receivable(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ReceivableId>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<Receivable>, ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    let receivable = state
        .finance
        .cancel_receivable(caller.tenant_id(), id, request.reason.trim(), Utc::now())
        .await?;
    Ok(Json(receivable))
}

/// Issues a boleto for the open balance of a receivable
pub async fn issue_boleto(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ReceivableId>,
    Json(request): Json<IssueBoletoRequest>,
) -> Result<(StatusCode, Json<BoletoResponse>), ApiError> {
    caller.require(Role::Finance)?;
    let tenant_id = caller.tenant_id();
    let boleto = state
        .finance
        .issue_boleto(
            tenant_id,
            id,
            BankAccountId::from_uuid(request.bank_account_id),
            &state.services.boleto_issuer,
            Utc::now(),
        )
        .await?;

    let (amount, due_date, line) = (boleto.amount, boleto.due_date, boleto.formatted_line());
    notify_customer(&state, tenant_id, boleto.customer_id, move |customer| MessageTemplate::BoletoIssued {
        customer_name: customer.name.clone(),
        amount,
        due_date,
        digitable_line: line,
    });

    let response = boleto_response(&state, boleto).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_boletos(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Boleto>>, ApiError> {
    caller.require(Role::Finance)?;
    let status = parse_filter(query.status.as_deref(), "boleto status", BoletoStatus::parse)?;
    Ok(Json(state.finance.list_boletos(caller.tenant_id(), status).await?))
}

pub async fn get_boleto(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<BoletoId>,
) -> Result<Json<BoletoResponse>, ApiError> {
    caller.require(Role::Finance)?;
    let boleto = state.finance.find_boleto(caller.tenant_id(), id).await?;
    Ok(Json(boleto_response(&state, boleto).await?))
}

/// Settles a boleto: receivable payment, ledger entries and bank balance in one transaction
pub async fn pay_boleto(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<BoletoId>,
    Json(request): Json<PayBoletoRequest>,
) -> Result<Json<BoletoPaymentResponse>, ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    let tenant_id = caller.tenant_id();
    let (tenant, _) = state.tenant_rules(tenant_id).await?;

    let (boleto, payment) = state
        .finance
        .pay_boleto(
            tenant_id,
            id,
            Money::brl(request.amount),
            request.paid_at.unwrap_or_else(Utc::now),
            &tenant.timezone(),
        )
        .await?;
    info!(boleto = %boleto.id, amount = %request.amount, "boleto paid");

    let (amount, reference) = (Money::brl(request.amount), format!("boleto {}", boleto.our_number));
    notify_customer(&state, tenant_id, boleto.customer_id, move |customer| {
        MessageTemplate::PaymentReceived {
            customer_name: customer.name.clone(),
            amount,
            reference,
        }
    });
    Ok(Json(BoletoPaymentResponse { boleto, payment }))
}

pub async fn cancel_boleto(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<BoletoId>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<Boleto>, ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    let boleto = state
        .finance
        .cancel_boleto(caller.tenant_id(), id, request.reason.trim(), Utc::now())
        .await?;
    Ok(Json(boleto))
}

/// Undoes a boleto payment (bounced or misattributed) with opposite ledger entries
pub async fn reverse_boleto_payment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<BoletoId>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<Boleto>, ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    let tenant_id = caller.tenant_id();
    let (tenant, _) = state.tenant_rules(tenant_id).await?;
    let boleto = state
        .finance
        .reverse_boleto_payment(
            tenant_id,
            id,
            request.reason.trim(),
            Utc::now(),
            &tenant.timezone(),
            &state.services.overdue_sweep,
        )
        .await?;
    Ok(Json(boleto))
}

/// Runs the overdue sweep for the caller's store now
pub async fn run_overdue_sweep(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<SweepReport>, ApiError> {
    caller.require(Role::Finance)?;
    let tenant_id = caller.tenant_id();
    let (_, rules) = state.tenant_rules(tenant_id).await?;
    let today = rules.today(Utc::now());
    let report = state
        .finance
        .run_overdue_sweep(tenant_id, today, &state.services.overdue_sweep)
        .await?;
    crate::jobs::notify_overdue(&state, tenant_id, &report, today).await;
    Ok(Json(report))
}

async fn boleto_response(state: &AppState, boleto: Boleto) -> Result<BoletoResponse, ApiError> {
    let (_, rules) = state.tenant_rules(boleto.tenant_id).await?;
    let today = rules.today(Utc::now());
    let amount_due_today = if boleto.status.is_open() {
        boleto.amount_due(today)
    } else {
        Money::zero(boleto.amount.currency())
    };
    Ok(BoletoResponse {
        formatted_line: boleto.formatted_line(),
        amount_due_today,
        boleto,
    })
}
