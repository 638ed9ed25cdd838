//! Investment simulation

use axum::Json;
use validator::Validate;

use core_kernel::Role;
use domain_investment::compare;

use crate::auth::Caller;
use crate::dto::messaging::{SimulateRequest, SimulateResponse};
use crate::error::ApiError;

/// Projects each scenario month by month, best net balance first
pub async fn simulate(
    caller: Caller,
    Json(request): Json<SimulateRequest>,
) -> Result<Json<SimulateResponse>, ApiError> {
    caller.require(Role::Finance)?;
    request.validate()?;
    let simulations = compare(&request.scenarios)?;
    Ok(Json(SimulateResponse { simulations }))
}
