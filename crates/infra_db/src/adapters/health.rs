//! Database readiness check

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable};

const ADAPTER_ID: &str = "postgres";

/// Reports whether the pool can still run a query
#[derive(Debug, Clone)]
pub struct PostgresHealthAdapter {
    pool: PgPool,
}

impl PostgresHealthAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresHealthAdapter {}

#[async_trait]
impl HealthCheckable for PostgresHealthAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(_) if self.pool.num_idle() == 0 && self.pool.size() >= self.pool.options().get_max_connections() => {
                (AdapterHealth::Degraded, Some("connection pool saturated".to_string()))
            }
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {e}"))),
        };
        HealthCheckResult {
            adapter_id: ADAPTER_ID.to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}
