//! Loyalty points and referral handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;
use validator::Validate;

use core_kernel::{CustomerId, ReferralId, Role};
use domain_loyalty::{LoyaltyAccount, Referral, ReferralStatus};

use crate::auth::Caller;
use crate::dto::loyalty::*;
use crate::dto::{parse_filter, ListQuery};
use crate::error::ApiError;
use crate::AppState;

/// Accounts ranked by lifetime points
pub async fn list_accounts(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<LoyaltyAccount>>, ApiError> {
    query.validate()?;
    Ok(Json(state.loyalty.list_accounts(caller.tenant_id(), query.limit()).await?))
}

/// A customer's account, opened empty on first access
pub async fn get_account(
    State(state): State<AppState>,
    caller: Caller,
    Path(customer_id): Path<CustomerId>,
) -> Result<Json<LoyaltyAccount>, ApiError> {
    let tenant_id = caller.tenant_id();
    state.orders.find_customer(tenant_id, customer_id).await?;
    Ok(Json(state.loyalty.account_for(tenant_id, customer_id).await?))
}

/// Converts points into a checkout discount
pub async fn redeem(
    State(state): State<AppState>,
    caller: Caller,
    Path(customer_id): Path<CustomerId>,
    Json(request): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;
    let (account, discount) = state
        .loyalty
        .redeem(caller.tenant_id(), customer_id, request.points, &state.services.loyalty_program)
        .await?;
    info!(customer = %customer_id, points = request.points, discount = %discount, "points redeemed");
    Ok(Json(RedeemResponse { account, discount }))
}

/// Links a new customer to the referrer owning `code`
pub async fn register_referral(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<RegisterReferralRequest>,
) -> Result<(StatusCode, Json<Referral>), ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;
    let referral = state
        .loyalty
        .register_referral(
            caller.tenant_id(),
            request.code.trim(),
            CustomerId::from_uuid(request.referred_id),
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(referral)))
}

pub async fn list_referrals(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Referral>>, ApiError> {
    let status = parse_filter(query.status.as_deref(), "referral status", ReferralStatus::parse)?;
    Ok(Json(state.loyalty.list_referrals(caller.tenant_id(), status).await?))
}

pub async fn get_referral(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ReferralId>,
) -> Result<Json<Referral>, ApiError> {
    Ok(Json(state.loyalty.find_referral(caller.tenant_id(), id).await?))
}

/// Expires pending referrals older than the program's window
pub async fn expire_referrals(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ExpiredReferralsResponse>, ApiError> {
    caller.require(Role::Sales)?;
    let expired = state
        .loyalty
        .expire_stale_referrals(caller.tenant_id(), &state.services.loyalty_program, Utc::now())
        .await?;
    Ok(Json(ExpiredReferralsResponse { expired }))
}
