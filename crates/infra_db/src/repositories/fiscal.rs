//! Fiscal invoices and their numbering

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use core_kernel::{Cnpj, FiscalInvoiceId, OrderId, TaxDocument, TenantId};
use domain_fiscal::{AccessKey, FiscalInvoice, FiscalInvoiceStatus, FiscalItem, FiscalModel, FiscalTotals};

use super::column;
use crate::error::DatabaseError;

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    tenant_id: Uuid,
    order_id: Option<Uuid>,
    model: String,
    series: i32,
    number: i64,
    issuer_cnpj: String,
    issuer_uf: i16,
    recipient_document: Option<String>,
    items: sqlx::types::Json<Vec<FiscalItem>>,
    totals: sqlx::types::Json<FiscalTotals>,
    status: String,
    access_key: Option<String>,
    protocol: Option<String>,
    rejection_reason: Option<String>,
    cancel_reason: Option<String>,
    issued_at: DateTime<Utc>,
    authorized_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for FiscalInvoice {
    type Error = DatabaseError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(FiscalInvoice {
            id: FiscalInvoiceId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            order_id: row.order_id.map(OrderId::from_uuid),
            model: column("model", &row.model, FiscalModel::parse)?,
            series: u16::try_from(row.series).map_err(|_| DatabaseError::invalid_value("series", row.series))?,
            number: u32::try_from(row.number).map_err(|_| DatabaseError::invalid_value("number", row.number))?,
            issuer_cnpj: Cnpj::parse(&row.issuer_cnpj)
                .map_err(|_| DatabaseError::invalid_value("issuer_cnpj", &row.issuer_cnpj))?,
            issuer_uf: u8::try_from(row.issuer_uf).map_err(|_| DatabaseError::invalid_value("issuer_uf", row.issuer_uf))?,
            recipient_document: row
                .recipient_document
                .as_deref()
                .map(|d| TaxDocument::parse(d).map_err(|_| DatabaseError::invalid_value("recipient_document", d)))
                .transpose()?,
            items: row.items.0,
            totals: row.totals.0,
            status: column("status", &row.status, FiscalInvoiceStatus::parse)?,
            access_key: row
                .access_key
                .as_deref()
                .map(|k| AccessKey::parse(k).map_err(|_| DatabaseError::invalid_value("access_key", k)))
                .transpose()?,
            protocol: row.protocol,
            rejection_reason: row.rejection_reason,
            cancel_reason: row.cancel_reason,
            issued_at: row.issued_at,
            authorized_at: row.authorized_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

const INVOICE_COLUMNS: &str = "id, tenant_id, order_id, model, series, number, issuer_cnpj, issuer_uf, \
     recipient_document, items, totals, status, access_key, protocol, rejection_reason, cancel_reason, \
     issued_at, authorized_at, cancelled_at";

/// Repository for NF-e and NFC-e documents
#[derive(Debug, Clone)]
pub struct FiscalRepository {
    pool: PgPool,
}

impl FiscalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reserves the next number of a model/series; numbers are never reused
    pub async fn next_number(&self, tenant_id: TenantId, model: FiscalModel, series: u16) -> Result<u32, DatabaseError> {
        let number: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO fiscal_sequences (tenant_id, model, series, last_number)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (tenant_id, model, series)
            DO UPDATE SET last_number = fiscal_sequences.last_number + 1
            RETURNING last_number
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(model.as_str())
        .bind(i32::from(series))
        .fetch_one(&self.pool)
        .await?;
        u32::try_from(number).map_err(|_| DatabaseError::invalid_value("fiscal number", number))
    }

    pub async fn insert(&self, invoice: &FiscalInvoice) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO fiscal_invoices (
                id, tenant_id, order_id, model, series, number, issuer_cnpj, issuer_uf,
                recipient_document, items, totals, status, access_key, protocol,
                rejection_reason, cancel_reason, issued_at, authorized_at, cancelled_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(*invoice.id.as_uuid())
        .bind(*invoice.tenant_id.as_uuid())
        .bind(invoice.order_id.map(|id| *id.as_uuid()))
        .bind(invoice.model.as_str())
        .bind(i32::from(invoice.series))
        .bind(i64::from(invoice.number))
        .bind(invoice.issuer_cnpj.digits())
        .bind(i16::from(invoice.issuer_uf))
        .bind(invoice.recipient_document.as_ref().map(|d| d.digits().to_string()))
        .bind(sqlx::types::Json(&invoice.items))
        .bind(sqlx::types::Json(&invoice.totals))
        .bind(invoice.status.as_str())
        .bind(invoice.access_key.as_ref().map(|k| k.digits().to_string()))
        .bind(&invoice.protocol)
        .bind(&invoice.rejection_reason)
        .bind(&invoice.cancel_reason)
        .bind(invoice.issued_at)
        .bind(invoice.authorized_at)
        .bind(invoice.cancelled_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate(
                "Fiscal invoice",
                "number",
                format!("{}-{}/{}", invoice.model.as_str(), invoice.series, invoice.number),
            ),
            other => other,
        })?;
        info!(invoice = %invoice.id, number = invoice.number, status = invoice.status.as_str(), "fiscal invoice stored");
        Ok(())
    }

    /// Writes back the authorization or cancellation outcome
    pub async fn update(&self, invoice: &FiscalInvoice) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE fiscal_invoices SET
                status = $3, access_key = $4, protocol = $5, rejection_reason = $6,
                cancel_reason = $7, issued_at = $8, authorized_at = $9, cancelled_at = $10
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(*invoice.tenant_id.as_uuid())
        .bind(*invoice.id.as_uuid())
        .bind(invoice.status.as_str())
        .bind(invoice.access_key.as_ref().map(|k| k.digits().to_string()))
        .bind(&invoice.protocol)
        .bind(&invoice.rejection_reason)
        .bind(&invoice.cancel_reason)
        .bind(invoice.issued_at)
        .bind(invoice.authorized_at)
        .bind(invoice.cancelled_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Fiscal invoice", invoice.id));
        }
        Ok(())
    }

    pub async fn find(&self, tenant_id: TenantId, id: FiscalInvoiceId) -> Result<FiscalInvoice, DatabaseError> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM fiscal_invoices WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Fiscal invoice", id))?
            .try_into()
    }

    pub async fn list(
        &self,
        tenant_id: TenantId,
        status: Option<FiscalInvoiceStatus>,
        limit: i64,
    ) -> Result<Vec<FiscalInvoice>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM fiscal_invoices
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY issued_at DESC
            LIMIT $3
            "#
        );
        sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(FiscalInvoice::try_from)
            .collect()
    }
}
