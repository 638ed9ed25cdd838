//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::{CoreError, DocumentError, MoneyError, PortError, TemporalError};
use domain_finance::FinanceError;
use domain_fiscal::FiscalError;
use domain_hr::HrError;
use domain_investment::InvestmentError;
use domain_loyalty::LoyaltyError;
use domain_messaging::MessagingError;
use domain_orders::OrderError;
use infra_db::DatabaseError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request is well formed but a business rule refuses it
    #[error("Business rule violated: {0}")]
    BusinessRule(String),

    #[error("Validation error: {message}")]
    Validation { message: String, details: Vec<String> },

    /// A gateway the request depends on is down or not configured
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A gateway answered with something unusable
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::BusinessRule(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "business_rule", msg.clone()),
            ApiError::Validation { message, .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message.clone())
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg.clone())
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg.clone()),
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error".to_string())
            }
            ApiError::Database(msg) => {
                error!(error = %msg, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", "Database error".to_string())
            }
        };

        let details = match self {
            ApiError::Validation { details, .. } if !details.is_empty() => Some(details),
            _ => None,
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::NotFound(msg),
            DatabaseError::DuplicateEntry(msg) | DatabaseError::PeriodOverlap(msg) => ApiError::Conflict(msg),
            DatabaseError::ForeignKeyViolation(msg) => ApiError::Conflict(msg),
            DatabaseError::ConstraintViolation(msg) => ApiError::BusinessRule(msg),
            DatabaseError::PoolExhausted => ApiError::ServiceUnavailable("database busy".to_string()),
            DatabaseError::ConcurrentUpdate(msg) => ApiError::Conflict(format!("{msg}; retry the request")),
            DatabaseError::Order(e) => e.into(),
            DatabaseError::Finance(e) => e.into(),
            DatabaseError::Hr(e) => e.into(),
            DatabaseError::Loyalty(e) => e.into(),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Forbidden(msg) => ApiError::Forbidden(msg),
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::InvalidStateTransition(msg) => ApiError::Conflict(msg),
            CoreError::Configuration(msg) => ApiError::Internal(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<MoneyError> for ApiError {
    fn from(err: MoneyError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<TemporalError> for ApiError {
    fn from(err: TemporalError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Validation { message, .. } => ApiError::BadRequest(message),
            PortError::Timeout { .. }
            | PortError::RateLimited { .. }
            | PortError::ServiceUnavailable { .. }
            | PortError::Connection { .. } => ApiError::ServiceUnavailable(err.to_string()),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { .. } | OrderError::EditWindowClosed(_) => {
                ApiError::Conflict(err.to_string())
            }
            OrderError::ItemNotFound(_) => ApiError::NotFound(err.to_string()),
            OrderError::InvalidQuantity(_) | OrderError::InvalidPaymentTerms(_) | OrderError::Money(_) => {
                ApiError::BadRequest(err.to_string())
            }
            _ => ApiError::BusinessRule(err.to_string()),
        }
    }
}

impl From<FinanceError> for ApiError {
    fn from(err: FinanceError) -> Self {
        match err {
            FinanceError::AccountNotFound(_) | FinanceError::EntryNotFound(_) => ApiError::NotFound(err.to_string()),
            FinanceError::AccountAlreadyExists(_)
            | FinanceError::InvalidTransition { .. }
            | FinanceError::PeriodClosed(_)
            | FinanceError::OverlappingPeriod(_) => ApiError::Conflict(err.to_string()),
            FinanceError::InvalidAmount(_)
            | FinanceError::InvalidBoletoData(_)
            | FinanceError::Money(_)
            | FinanceError::Temporal(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::BusinessRule(err.to_string()),
        }
    }
}

impl From<HrError> for ApiError {
    fn from(err: HrError) -> Self {
        match err {
            HrError::Finance(e) => e.into(),
            HrError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            HrError::InvalidInput(_) | HrError::Money(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::BusinessRule(err.to_string()),
        }
    }
}

impl From<LoyaltyError> for ApiError {
    fn from(err: LoyaltyError) -> Self {
        match err {
            LoyaltyError::InvalidTransition { .. } | LoyaltyError::AlreadyReferred(_) => {
                ApiError::Conflict(err.to_string())
            }
            _ => ApiError::BusinessRule(err.to_string()),
        }
    }
}

impl From<InvestmentError> for ApiError {
    fn from(err: InvestmentError) -> Self {
        match err {
            InvestmentError::InvalidInput(_) => ApiError::validation(err.to_string()),
            InvestmentError::Calculation(_) => ApiError::BusinessRule(err.to_string()),
        }
    }
}

impl From<FiscalError> for ApiError {
    fn from(err: FiscalError) -> Self {
        match err {
            FiscalError::Port(e) => e.into(),
            FiscalError::InvalidTransition { .. } | FiscalError::CancellationWindowExpired => {
                ApiError::Conflict(err.to_string())
            }
            FiscalError::Rejected { .. } => ApiError::BusinessRule(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<MessagingError> for ApiError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::Port(e) => e.into(),
            MessagingError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{field}: {msg}"),
                    None => format!("{field}: {}", e.code),
                })
            })
            .collect();
        details.sort();
        ApiError::Validation {
            message: "request validation failed".to_string(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use core_kernel::Money;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = DatabaseError::not_found("Boleto", "x").into();
        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_domain_errors_nested_in_database_error() {
        let err: ApiError = DatabaseError::Order(OrderError::CreditLimitExceeded {
            available: Money::brl(dec!(10)),
            requested: Money::brl(dec!(50)),
        })
        .into();
        assert_eq!(status_of(err), StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = DatabaseError::Finance(FinanceError::PeriodClosed("2026-01".to_string())).into();
        assert_eq!(status_of(err), StatusCode::CONFLICT);
    }

    #[test]
    fn test_forbidden_role() {
        let err: ApiError = CoreError::Forbidden("role 'finance' required".to_string()).into();
        assert_eq!(status_of(err), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_gateway_timeout_is_unavailable() {
        let err: ApiError = MessagingError::Port(PortError::Timeout {
            operation: "send_text".to_string(),
            duration_ms: 5000,
        })
        .into();
        assert_eq!(status_of(err), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_database_details_are_not_leaked() {
        let err = ApiError::Database("relation \"boletos\" does not exist".to_string());
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
