//! Database error types
//!
//! Errors raised by the pool, by SQL execution and by the domain rules the
//! transactional flows apply between reading and writing rows.

use thiserror::Error;

use domain_finance::FinanceError;
use domain_hr::HrError;
use domain_loyalty::LoyaltyError;
use domain_orders::OrderError;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Exclusion constraint violation (overlapping closing periods)
    #[error("Overlapping period: {0}")]
    PeriodOverlap(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped back to its domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deadlock or serialization failure; the transaction can be retried
    #[error("Concurrent update: {0}")]
    ConcurrentUpdate(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Finance(#[from] FinanceError),

    #[error(transparent)]
    Hr(#[from] HrError),

    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Boleto", "BOL-123");
    /// assert!(error.to_string().contains("Boleto"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Creates a duplicate entry error
    pub fn duplicate(entity: &str, field: &str, value: impl std::fmt::Display) -> Self {
        DatabaseError::DuplicateEntry(format!(
            "{} with {} '{}' already exists",
            entity, field, value
        ))
    }

    /// Creates an error for a column value the domain does not recognize
    pub fn invalid_value(column: &str, value: impl std::fmt::Display) -> Self {
        DatabaseError::SerializationError(format!("unexpected {} value '{}'", column, value))
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
                | DatabaseError::PeriodOverlap(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }

    /// Checks if running the transaction again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::ConcurrentUpdate(_) | DatabaseError::PoolExhausted)
    }

    /// Checks if a domain rule rejected the operation
    pub fn is_domain_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::Order(_)
                | DatabaseError::Finance(_)
                | DatabaseError::Hr(_)
                | DatabaseError::Loyalty(_)
        )
    }
}

/// Maps SQLx errors by PostgreSQL error code
///
/// https://www.postgresql.org/docs/current/errcodes-appendix.html
impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::SerializationError(error.to_string())
            }
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(message),
                    Some("23503") => DatabaseError::ForeignKeyViolation(message),
                    Some("23514") => DatabaseError::ConstraintViolation(message),
                    Some("23P01") => DatabaseError::PeriodOverlap(message),
                    Some("40P01") | Some("40001") => DatabaseError::ConcurrentUpdate(message),
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(error: serde_json::Error) -> Self {
        DatabaseError::SerializationError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(error.is_not_found());
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let error = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(error.is_connection_error());
    }

    #[test]
    fn test_concurrent_update_is_retryable() {
        let error = DatabaseError::ConcurrentUpdate("deadlock detected".to_string());
        assert!(error.is_retryable());
        assert!(!error.is_constraint_violation());
        assert!(!DatabaseError::from(FinanceError::PeriodClosed("2024-05".to_string())).is_retryable());
    }

    #[test]
    fn test_domain_errors_pass_through() {
        let error = DatabaseError::from(FinanceError::PeriodClosed("2024-05".to_string()));
        assert!(error.is_domain_error());
        assert_eq!(error.to_string(), "Period is closed: 2024-05");
    }
}
