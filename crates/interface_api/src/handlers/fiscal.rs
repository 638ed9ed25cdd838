//! NF-e / NFC-e handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;
use validator::Validate;

use core_kernel::{FiscalInvoiceId, Money, OrderId, Rate, Role, TaxDocument};
use domain_fiscal::{FiscalInvoice, FiscalInvoiceStatus, FiscalItem, FiscalModel};

use crate::auth::Caller;
use crate::dto::fiscal::*;
use crate::dto::{parse_filter, ListQuery, ReasonRequest};
use crate::error::ApiError;
use crate::AppState;

/// Numbers, stores and sends an invoice for authorization
///
/// The draft is stored before the authorizer is called, so a gateway failure
/// leaves a numbered draft that `authorize_invoice` can retry.
pub async fn issue_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<IssueInvoiceRequest>,
) -> Result<(StatusCode, Json<FiscalInvoice>), ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;
    let model = FiscalModel::parse(&request.model.to_uppercase())
        .ok_or_else(|| ApiError::validation(format!("unknown fiscal model '{}'", request.model)))?;
    let recipient = request.recipient_document.as_deref().map(TaxDocument::parse).transpose()?;

    let tenant_id = caller.tenant_id();
    let tenant = state.tenants.get(tenant_id).await?;
    let cnpj = tenant
        .cnpj()?
        .ok_or_else(|| ApiError::BusinessRule("the store has no CNPJ registered for fiscal documents".to_string()))?;
    let uf = u8::try_from(tenant.uf_code)
        .map_err(|_| ApiError::Internal(format!("invalid UF code {} for tenant", tenant.uf_code)))?;
    let order_id = match request.order_id {
        Some(id) => Some(state.orders.find_order(tenant_id, OrderId::from_uuid(id)).await?.id),
        None => None,
    };

    let series = state.config.fiscal_series;
    let number = state.fiscal.next_number(tenant_id, model, series).await?;
    let mut invoice = FiscalInvoice::new(tenant_id, model, series, number, cnpj, uf);
    if let Some(order_id) = order_id {
        invoice = invoice.for_order(order_id);
    }
    if let Some(document) = recipient {
        invoice = invoice.with_recipient(document);
    }
    for item in request.items {
        invoice.add_item(FiscalItem {
            product_code: item.product_code,
            description: item.description,
            ncm: item.ncm,
            cfop: item.cfop,
            quantity: item.quantity,
            unit_price: Money::brl(item.unit_price),
            icms_rate: Rate::from_percentage(item.icms_rate),
        })?;
    }
    invoice.validate()?;
    state.fiscal.insert(&invoice).await?;

    let status = invoice.authorize(&*state.services.fiscal_authorizer, Utc::now()).await?;
    state.fiscal.update(&invoice).await?;
    info!(invoice = %invoice.id, model = model.as_str(), number, status = status.as_str(), "invoice issued");
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Retries authorization of a draft left behind by a gateway failure
pub async fn authorize_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<FiscalInvoiceId>,
) -> Result<Json<FiscalInvoice>, ApiError> {
    caller.require(Role::Sales)?;
    let mut invoice = state.fiscal.find(caller.tenant_id(), id).await?;
    invoice.authorize(&*state.services.fiscal_authorizer, Utc::now()).await?;
    state.fiscal.update(&invoice).await?;
    Ok(Json(invoice))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<FiscalInvoice>>, ApiError> {
    query.validate()?;
    let status = parse_filter(query.status.as_deref(), "invoice status", FiscalInvoiceStatus::parse)?;
    Ok(Json(state.fiscal.list(caller.tenant_id(), status, query.limit()).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<FiscalInvoiceId>,
) -> Result<Json<FiscalInvoice>, ApiError> {
    Ok(Json(state.fiscal.find(caller.tenant_id(), id).await?))
}

/// Cancels an authorized invoice inside the 24 hour window
pub async fn cancel_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<FiscalInvoiceId>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<FiscalInvoice>, ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    let mut invoice = state.fiscal.find(caller.tenant_id(), id).await?;
    invoice
        .cancel(&*state.services.fiscal_authorizer, &request.reason, Utc::now())
        .await?;
    state.fiscal.update(&invoice).await?;
    Ok(Json(invoice))
}
