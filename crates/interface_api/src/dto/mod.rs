//! Request and response bodies
//!
//! Amounts arrive as plain decimals in reais; ids as bare UUIDs.

pub mod finance;
pub mod fiscal;
pub mod hr;
pub mod loyalty;
pub mod messaging;
pub mod sales;

use rust_decimal::Decimal;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::ApiError;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 500;

pub(crate) fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_positive() && !value.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("positive").with_message("must be greater than zero".into()))
    }
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        Err(ValidationError::new("non_negative").with_message("must not be negative".into()))
    } else {
        Ok(())
    }
}

/// Parses an optional status filter from a query string
pub(crate) fn parse_filter<T>(value: Option<&str>, field: &str, parse: fn(&str) -> Option<T>) -> Result<Option<T>, ApiError> {
    value
        .map(|v| {
            let normalized = v.trim().to_ascii_uppercase();
            parse(&normalized).ok_or_else(|| ApiError::BadRequest(format!("unknown {field} '{v}'")))
        })
        .transpose()
}

/// Common `?status=&limit=` query
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListQuery {
    pub status: Option<String>,
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Body of every cancel/reverse operation
#[derive(Debug, Deserialize, Validate)]
pub struct ReasonRequest {
    #[validate(length(min = 3, max = 500))]
    pub reason: String,
}
