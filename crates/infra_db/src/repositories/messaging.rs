//! Outbound WhatsApp message log

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use core_kernel::{CustomerId, MessageId, TenantId};
use domain_messaging::{MessageStatus, OutboundMessage, PhoneNumber};

use super::{column, to_u32};
use crate::error::DatabaseError;

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    tenant_id: Uuid,
    customer_id: Option<Uuid>,
    phone: String,
    template: Option<String>,
    body: String,
    status: String,
    external_id: Option<String>,
    error: Option<String>,
    attempts: i32,
    scheduled_for: DateTime<Utc>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<MessageRow> for OutboundMessage {
    type Error = DatabaseError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(OutboundMessage {
            id: MessageId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            customer_id: row.customer_id.map(CustomerId::from_uuid),
            to: PhoneNumber::parse_br(&row.phone).map_err(|_| DatabaseError::invalid_value("phone", &row.phone))?,
            template: row.template,
            body: row.body,
            status: column("status", &row.status, MessageStatus::parse)?,
            external_id: row.external_id,
            error: row.error,
            attempts: to_u32("attempts", row.attempts)?,
            scheduled_for: row.scheduled_for,
            created_at: row.created_at,
            sent_at: row.sent_at,
        })
    }
}

const MESSAGE_COLUMNS: &str = "id, tenant_id, customer_id, phone, template, body, status, external_id, \
     error, attempts, scheduled_for, created_at, sent_at";

#[derive(Debug, Clone)]
pub struct MessagingRepository {
    pool: PgPool,
}

impl MessagingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, message: &OutboundMessage) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO outbound_messages (
                id, tenant_id, customer_id, phone, template, body, status, external_id,
                error, attempts, scheduled_for, created_at, sent_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(*message.id.as_uuid())
        .bind(*message.tenant_id.as_uuid())
        .bind(message.customer_id.map(|c| *c.as_uuid()))
        .bind(message.to.digits())
        .bind(&message.template)
        .bind(&message.body)
        .bind(message.status.as_str())
        .bind(&message.external_id)
        .bind(&message.error)
        .bind(message.attempts as i32)
        .bind(message.scheduled_for)
        .bind(message.created_at)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await?;
        debug!(message = %message.id, status = message.status.as_str(), "message logged");
        Ok(())
    }

    /// Records a delivery attempt
    pub async fn update(&self, message: &OutboundMessage) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_messages SET
                status = $3, external_id = $4, error = $5, attempts = $6,
                scheduled_for = $7, sent_at = $8
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(*message.tenant_id.as_uuid())
        .bind(*message.id.as_uuid())
        .bind(message.status.as_str())
        .bind(&message.external_id)
        .bind(&message.error)
        .bind(message.attempts as i32)
        .bind(message.scheduled_for)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Message", message.id));
        }
        Ok(())
    }

    /// Queued messages across tenants whose quiet-hours deferral has passed
    pub async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboundMessage>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM outbound_messages
            WHERE status = 'QUEUED' AND scheduled_for <= $1
            ORDER BY scheduled_for
            LIMIT $2
            "#
        );
        sqlx::query_as::<_, MessageRow>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(OutboundMessage::try_from)
            .collect()
    }

    pub async fn list(
        &self,
        tenant_id: TenantId,
        status: Option<MessageStatus>,
        limit: i64,
    ) -> Result<Vec<OutboundMessage>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM outbound_messages
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        );
        sqlx::query_as::<_, MessageRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(OutboundMessage::try_from)
            .collect()
    }
}
