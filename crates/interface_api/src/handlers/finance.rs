//! Bank accounts, ledger entries, closings and the DRE

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use validator::Validate;

use core_kernel::{BankAccountId, ClosingId, DateRange, FinancialEntryId, Money, Role};
use domain_finance::{
    BankAccount, BankAccountKind, DreReport, EntryCategory, EntryKind, FinancialClosing, FinancialEntry,
};

use crate::auth::Caller;
use crate::dto::finance::*;
use crate::dto::ReasonRequest;
use crate::error::ApiError;
use crate::AppState;

pub async fn create_bank_account(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateBankAccountRequest>,
) -> Result<(StatusCode, Json<BankAccount>), ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    let kind = BankAccountKind::parse(&request.kind.to_lowercase())
        .ok_or_else(|| ApiError::validation(format!("unknown bank account kind '{}'", request.kind)))?;

    let mut account = BankAccount::new(
        caller.tenant_id(),
        request.name.trim(),
        kind,
        Money::brl(request.opening_balance.unwrap_or(Decimal::ZERO)),
    );
    if let Some(bank_code) = request.bank_code {
        account = account.with_bank(
            bank_code,
            request.agency.unwrap_or_default(),
            request.number.unwrap_or_default(),
        );
    }

    state.finance.insert_bank_account(&account).await?;
    info!(account = %account.id, kind = kind.as_str(), "bank account opened");
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn list_bank_accounts(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<BankAccount>>, ApiError> {
    caller.require(Role::Finance)?;
    Ok(Json(state.finance.list_bank_accounts(caller.tenant_id()).await?))
}

pub async fn get_bank_account(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<BankAccountId>,
) -> Result<Json<BankAccount>, ApiError> {
    caller.require(Role::Finance)?;
    Ok(Json(state.finance.find_bank_account(caller.tenant_id(), id).await?))
}

/// Moves money between two of the store's accounts
pub async fn transfer(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    if request.from_account_id == request.to_account_id {
        return Err(ApiError::validation("cannot transfer to the same account"));
    }
    let tenant_id = caller.tenant_id();
    let now = Utc::now();
    let date = match request.date {
        Some(date) => date,
        None => state.tenant_rules(tenant_id).await?.1.today(now),
    };

    let (outgoing, incoming) = state
        .finance
        .transfer(
            tenant_id,
            BankAccountId::from_uuid(request.from_account_id),
            BankAccountId::from_uuid(request.to_account_id),
            Money::brl(request.amount),
            date,
            now,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(TransferResponse { outgoing, incoming })))
}

/// Records a manual income or expense
pub async fn create_entry(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<FinancialEntry>), ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;

    let category = EntryCategory::parse(&request.category.to_lowercase())
        .ok_or_else(|| ApiError::validation(format!("unknown category '{}'", request.category)))?;
    let tenant_id = caller.tenant_id();
    let account = BankAccountId::from_uuid(request.bank_account_id);
    let amount = Money::brl(request.amount);
    let description = request.description.trim();

    let mut entry = match EntryKind::parse(&request.kind.to_lowercase()) {
        Some(EntryKind::Income) => {
            FinancialEntry::income(tenant_id, account, category, description, amount, request.competence_date)?
        }
        Some(EntryKind::Expense) => {
            FinancialEntry::expense(tenant_id, account, category, description, amount, request.competence_date)?
        }
        _ => return Err(ApiError::validation("kind must be 'income' or 'expense'; use /transfers to move money")),
    };
    if let Some(due_date) = request.due_date {
        entry = entry.with_due_date(due_date);
    }

    let settle_at = request.settle.then(Utc::now);
    let entry = state.finance.record_entry(entry, settle_at).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Entries whose competence date falls in the period
pub async fn list_entries(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<FinancialEntry>>, ApiError> {
    caller.require(Role::Finance)?;
    let period = DateRange::new(query.start, query.end)?;
    let entries = state
        .finance
        .entries_for_period(caller.tenant_id(), &period, query.bank_account_id.map(BankAccountId::from_uuid))
        .await?;
    Ok(Json(entries))
}

pub async fn get_entry(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<FinancialEntryId>,
) -> Result<Json<FinancialEntry>, ApiError> {
    caller.require(Role::Finance)?;
    Ok(Json(state.finance.find_entry(caller.tenant_id(), id).await?))
}

pub async fn settle_entry(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<FinancialEntryId>,
) -> Result<Json<FinancialEntry>, ApiError> {
    caller.require(Role::Finance)?;
    Ok(Json(state.finance.settle_entry(caller.tenant_id(), id, Utc::now()).await?))
}

pub async fn cancel_entry(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<FinancialEntryId>,
) -> Result<Json<FinancialEntry>, ApiError> {
    caller.require(Role::Finance)?;
    Ok(Json(state.finance.cancel_entry(caller.tenant_id(), id).await?))
}

/// Reverses a settled entry; returns the reversal
pub async fn reverse_entry(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<FinancialEntryId>,
    Json(request): Json<ReasonRequest>,
) -> Result<(StatusCode, Json<FinancialEntry>), ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    let reversal = state
        .finance
        .reverse_entry(caller.tenant_id(), id, request.reason.trim(), Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(reversal)))
}

/// Closes a period: snapshots balances and locks its entries
pub async fn close_period(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<ClosePeriodRequest>,
) -> Result<(StatusCode, Json<FinancialClosing>), ApiError> {
    caller.require(Role::Finance)?;
    let period = DateRange::new(request.start, request.end)?;
    let closing = state
        .finance
        .close_period(
            caller.tenant_id(),
            period,
            &state.services.closing_builder,
            caller.user_id(),
            Utc::now(),
        )
        .await?;
    info!(closing = %closing.id, by = %caller.user_id(), "period closed");
    Ok((StatusCode::CREATED, Json(closing)))
}

pub async fn list_closings(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<FinancialClosing>>, ApiError> {
    caller.require(Role::Finance)?;
    Ok(Json(state.finance.list_closings(caller.tenant_id()).await?))
}

pub async fn get_closing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ClosingId>,
) -> Result<Json<FinancialClosing>, ApiError> {
    caller.require(Role::Finance)?;
    Ok(Json(state.finance.find_closing(caller.tenant_id(), id).await?))
}

/// Reopens a closed period; admins only
pub async fn reopen_closing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ClosingId>,
) -> Result<Json<FinancialClosing>, ApiError> {
    caller.require(Role::Admin)?;
    let closing = state
        .finance
        .reopen_closing(caller.tenant_id(), id, caller.user_id(), Utc::now())
        .await?;
    info!(closing = %closing.id, by = %caller.user_id(), "period reopened");
    Ok(Json(closing))
}

/// Income statement built from the period's settled entries
pub async fn dre_report(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<DreReport>, ApiError> {
    caller.require(Role::Finance)?;
    let period = DateRange::new(query.start, query.end)?;
    let entries = state
        .finance
        .entries_for_period(caller.tenant_id(), &period, query.bank_account_id.map(BankAccountId::from_uuid))
        .await?;
    Ok(Json(DreReport::build(period, &entries)?))
}
