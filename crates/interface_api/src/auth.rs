//! Authentication and authorization

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use core_kernel::{Role, TenantContext, TenantId, UserId};

use crate::error::ApiError;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Store the user works for
    pub tenant_id: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Resolves the caller; unknown role names are dropped
    pub fn tenant_context(&self) -> Result<TenantContext, AuthError> {
        let tenant_id = Uuid::parse_str(&self.tenant_id).map_err(|_| AuthError::InvalidToken)?;
        let user_id = Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)?;
        let roles = self.roles.iter().filter_map(|r| r.parse::<Role>().ok()).collect();
        Ok(TenantContext::new(
            TenantId::from_uuid(tenant_id),
            UserId::from_uuid(user_id),
            roles,
        ))
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `context` - Tenant, user and roles to encode
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(context: &TenantContext, secret: &str, expiration_secs: u64) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(i64::try_from(expiration_secs).unwrap_or(i64::MAX / 1000));

    let claims = Claims {
        sub: context.user_id.as_uuid().to_string(),
        tenant_id: context.tenant_id.as_uuid().to_string(),
        roles: context.roles.iter().map(|r| r.as_str().to_string()).collect(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// The authenticated caller, as placed in the request by `auth_middleware`
#[derive(Debug, Clone)]
pub struct Caller(pub TenantContext);

impl Caller {
    pub fn tenant_id(&self) -> TenantId {
        self.0.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.0.user_id
    }

    /// Fails with 403 unless the caller holds `role` (admins hold all)
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        self.0.require(role).map_err(ApiError::from)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(Caller)
            .ok_or(ApiError::Unauthorized)
    }
}
