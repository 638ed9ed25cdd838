//! PostgreSQL pool and schema migrations
//!
//! The API server and the one-shot overdue sweep each open their own pool.
//! Connections carry an `application_name` so the two show up apart in
//! `pg_stat_activity`, and a `statement_timeout` so a stuck row lock in a
//! money flow fails the request instead of holding a connection forever.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

pub type DatabasePool = PgPool;

/// Pool settings
///
/// ```rust
/// use infra_db::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new("postgres://localhost/atacarejo")
///     .max_connections(20)
///     .statement_timeout(Duration::from_secs(5));
/// assert_eq!(config.application_name, "atacarejo-api");
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub application_name: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a request waits for a free connection
    pub acquire_timeout: Duration,
    /// Server-side limit for a single statement, including lock waits
    pub statement_timeout: Duration,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

impl DatabaseConfig {
    /// Settings for the API server
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            application_name: "atacarejo-api".to_string(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            statement_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
        }
    }

    /// Settings for the cron sweep: tenants run one after another, so two
    /// connections are plenty and none are kept warm
    pub fn for_sweep(url: impl Into<String>) -> Self {
        Self {
            application_name: "overdue-sweep".to_string(),
            max_connections: 2,
            min_connections: 0,
            statement_timeout: Duration::from_secs(120),
            ..Self::new(url)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Parses the URL and applies the per-connection session settings
    pub fn connect_options(&self) -> Result<PgConnectOptions, DatabaseError> {
        let timeout_ms = self.statement_timeout.as_millis().to_string();
        Ok(PgConnectOptions::from_str(&self.url)
            .map_err(|e| DatabaseError::ConnectionFailed(format!("invalid database url: {e}")))?
            .application_name(&self.application_name)
            .options([("statement_timeout", timeout_ms.as_str())]))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/atacarejo")
    }
}

/// Opens the pool and checks that one connection can be made
///
/// # Errors
///
/// `DatabaseError::ConnectionFailed` for a malformed URL or an unreachable server
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        application = %config.application_name,
        max_connections = config.max_connections,
        statement_timeout_ms = config.statement_timeout.as_millis() as u64,
        "creating database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!("database pool created");
    Ok(pool)
}

/// Applies the migrations under `migrations/` that have not run yet
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_pool_is_small_and_named() {
        let config = DatabaseConfig::for_sweep("postgres://localhost/atacarejo");
        assert_eq!(config.application_name, "overdue-sweep");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.min_connections, 0);
        assert_eq!(config.url, "postgres://localhost/atacarejo");
    }

    #[test]
    fn test_connect_options_carry_session_settings() {
        let options = DatabaseConfig::new("postgres://app:secret@db:5433/loja")
            .statement_timeout(Duration::from_secs(5))
            .connect_options()
            .unwrap();
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("loja"));
        assert_eq!(options.get_application_name(), Some("atacarejo-api"));
        assert!(options.get_options().unwrap_or_default().contains("statement_timeout=5000"));
    }

    #[test]
    fn test_malformed_url_is_a_connection_error() {
        let error = DatabaseConfig::new("not a url").connect_options().unwrap_err();
        assert!(error.is_connection_error());
    }
}
