//! Tenants

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{Cnpj, TenantId, Timezone};
use crate::error::DatabaseError;

/// A business using the platform
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TenantRecord {
    pub id: Uuid,
    pub name: String,
    pub cnpj: Option<String>,
    /// IBGE state code used in fiscal keys
    pub uf_code: i16,
    pub timezone: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl TenantRecord {
    pub fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.id)
    }

    /// The tenant's business timezone; unknown names fall back to São Paulo
    pub fn timezone(&self) -> Timezone {
        Timezone::parse(&self.timezone).unwrap_or_default()
    }

    pub fn cnpj(&self) -> Result<Option<Cnpj>, DatabaseError> {
        self.cnpj
            .as_deref()
            .map(|c| Cnpj::parse(c).map_err(|_| DatabaseError::invalid_value("cnpj", c)))
            .transpose()
    }
}

#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        name: &str,
        cnpj: Option<&Cnpj>,
        uf_code: u8,
        timezone: &Timezone,
    ) -> Result<TenantRecord, DatabaseError> {
        let row = sqlx::query_as::<_, TenantRecord>(
            r#"
            INSERT INTO tenants (id, name, cnpj, uf_code, timezone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, cnpj, uf_code, timezone, active, created_at
            "#,
        )
        .bind(*TenantId::new_v7().as_uuid())
        .bind(name)
        .bind(cnpj.map(|c| c.digits().to_string()))
        .bind(i16::from(uf_code))
        .bind(timezone.0.name())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get(&self, tenant_id: TenantId) -> Result<TenantRecord, DatabaseError> {
        sqlx::query_as::<_, TenantRecord>(
            "SELECT id, name, cnpj, uf_code, timezone, active, created_at FROM tenants WHERE id = $1",
        )
        .bind(*tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Tenant", tenant_id))
    }

    /// Active tenants, oldest first
    pub async fn list_active(&self) -> Result<Vec<TenantRecord>, DatabaseError> {
        let rows = sqlx::query_as::<_, TenantRecord>(
            r#"
            SELECT id, name, cnpj, uf_code, timezone, active, created_at
            FROM tenants
            WHERE active
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
