//! Fiscal invoice aggregate

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use core_kernel::{Cnpj, Currency, FiscalInvoiceId, Money, OrderId, Rate, TaxDocument, TenantId};
use crate::access_key::AccessKey;
use crate::authorizer::{AuthorizationResponse, FiscalAuthorizer};
use crate::error::FiscalError;

/// Minimum length of a cancellation reason ("justificativa")
pub const MIN_CANCEL_REASON: usize = 15;

/// Hours after authorization during which an invoice can be cancelled
pub const CANCEL_WINDOW_HOURS: i64 = 24;

/// Normal emission ("tpEmis" 1)
const EMISSION_NORMAL: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FiscalModel {
    /// Nota Fiscal Eletrônica, model 55
    NFe,
    /// Nota Fiscal de Consumidor Eletrônica, model 65
    NFCe,
}

impl FiscalModel {
    pub fn code(&self) -> u8 {
        match self {
            FiscalModel::NFe => 55,
            FiscalModel::NFCe => 65,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "55" => Some(FiscalModel::NFe),
            "65" => Some(FiscalModel::NFCe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FiscalModel::NFe => "NFE",
            FiscalModel::NFCe => "NFCE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NFE" => Some(FiscalModel::NFe),
            "NFCE" => Some(FiscalModel::NFCe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiscalInvoiceStatus {
    Draft,
    Authorized,
    Cancelled,
    Rejected,
}

impl FiscalInvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FiscalInvoiceStatus::Draft => "DRAFT",
            FiscalInvoiceStatus::Authorized => "AUTHORIZED",
            FiscalInvoiceStatus::Cancelled => "CANCELLED",
            FiscalInvoiceStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(FiscalInvoiceStatus::Draft),
            "AUTHORIZED" => Some(FiscalInvoiceStatus::Authorized),
            "CANCELLED" => Some(FiscalInvoiceStatus::Cancelled),
            "REJECTED" => Some(FiscalInvoiceStatus::Rejected),
            _ => None,
        }
    }
}

/// One product line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalItem {
    pub product_code: String,
    pub description: String,
    /// 8-digit Mercosur nomenclature code
    pub ncm: String,
    /// 4-digit fiscal operation code, e.g. 5102 for an in-state resale
    pub cfop: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub icms_rate: Rate,
}

impl FiscalItem {
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity).round_to_currency()
    }

    pub fn icms(&self) -> Money {
        self.icms_rate.apply(&self.total()).round_to_currency()
    }

    fn validate(&self) -> Result<(), FiscalError> {
        let all_digits = |s: &str, len: usize| s.len() == len && s.chars().all(|c| c.is_ascii_digit());
        if !all_digits(&self.ncm, 8) {
            return Err(FiscalError::InvalidItem(format!("NCM '{}' must have 8 digits", self.ncm)));
        }
        if !all_digits(&self.cfop, 4) {
            return Err(FiscalError::InvalidItem(format!("CFOP '{}' must have 4 digits", self.cfop)));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(FiscalError::InvalidItem("quantity must be positive".to_string()));
        }
        if !self.unit_price.is_positive() {
            return Err(FiscalError::InvalidItem("unit price must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalTotals {
    pub products: Money,
    pub icms: Money,
    pub total: Money,
}

impl FiscalTotals {
    fn zero() -> Self {
        Self {
            products: Money::zero(Currency::BRL),
            icms: Money::zero(Currency::BRL),
            total: Money::zero(Currency::BRL),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalInvoice {
    pub id: FiscalInvoiceId,
    pub tenant_id: TenantId,
    pub order_id: Option<OrderId>,
    pub model: FiscalModel,
    pub series: u16,
    pub number: u32,
    pub issuer_cnpj: Cnpj,
    /// IBGE code of the issuer's state (35 = SP)
    pub issuer_uf: u8,
    pub recipient_document: Option<TaxDocument>,
    pub items: Vec<FiscalItem>,
    pub totals: FiscalTotals,
    pub status: FiscalInvoiceStatus,
    pub access_key: Option<AccessKey>,
    pub protocol: Option<String>,
    pub rejection_reason: Option<String>,
    pub cancel_reason: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl FiscalInvoice {
    pub fn new(
        tenant_id: TenantId,
        model: FiscalModel,
        series: u16,
        number: u32,
        issuer_cnpj: Cnpj,
        issuer_uf: u8,
    ) -> Self {
        Self {
            id: FiscalInvoiceId::new_v7(),
            tenant_id,
            order_id: None,
            model,
            series,
            number,
            issuer_cnpj,
            issuer_uf,
            recipient_document: None,
            items: Vec::new(),
            totals: FiscalTotals::zero(),
            status: FiscalInvoiceStatus::Draft,
            access_key: None,
            protocol: None,
            rejection_reason: None,
            cancel_reason: None,
            issued_at: Utc::now(),
            authorized_at: None,
            cancelled_at: None,
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_recipient(mut self, document: TaxDocument) -> Self {
        self.recipient_document = Some(document);
        self
    }

    pub fn add_item(&mut self, item: FiscalItem) -> Result<(), FiscalError> {
        self.ensure_status(FiscalInvoiceStatus::Draft, "DRAFT")?;
        item.validate()?;
        self.items.push(item);
        self.recalculate()?;
        Ok(())
    }

    fn recalculate(&mut self) -> Result<(), FiscalError> {
        let mut totals = FiscalTotals::zero();
        for item in &self.items {
            totals.products = totals.products.checked_add(&item.total())?;
            totals.icms = totals.icms.checked_add(&item.icms())?;
        }
        // ICMS is embedded in the product price, so it does not add to the total
        totals.total = totals.products;
        self.totals = totals;
        Ok(())
    }

    /// Checks what the tax authority would reject before sending
    pub fn validate(&self) -> Result<(), FiscalError> {
        if self.items.is_empty() {
            return Err(FiscalError::EmptyInvoice);
        }
        if self.model == FiscalModel::NFe && self.recipient_document.is_none() {
            return Err(FiscalError::MissingRecipient);
        }
        Ok(())
    }

    /// Draft → Authorized | Rejected
    ///
    /// The access key is generated on the first attempt and kept, so a
    /// retried authorization reuses it.
    pub async fn authorize(
        &mut self,
        authorizer: &dyn FiscalAuthorizer,
        now: DateTime<Utc>,
    ) -> Result<FiscalInvoiceStatus, FiscalError> {
        self.ensure_status(FiscalInvoiceStatus::Draft, "AUTHORIZED")?;
        self.validate()?;

        if self.access_key.is_none() {
            let numeric_code = rand::rng().random_range(10_000_000..=99_999_999);
            self.issued_at = now;
            self.access_key = Some(AccessKey::build(
                self.issuer_uf,
                now,
                &self.issuer_cnpj,
                self.model,
                self.series,
                self.number,
                EMISSION_NORMAL,
                numeric_code,
            )?);
        }

        match authorizer.authorize(self).await? {
            AuthorizationResponse::Authorized { protocol } => {
                info!(invoice = %self.id, number = self.number, protocol = %protocol, "invoice authorized");
                self.status = FiscalInvoiceStatus::Authorized;
                self.protocol = Some(protocol);
                self.authorized_at = Some(now);
                self.rejection_reason = None;
            }
            AuthorizationResponse::Rejected { code, reason } => {
                warn!(invoice = %self.id, code, reason = %reason, "invoice rejected");
                self.status = FiscalInvoiceStatus::Rejected;
                self.rejection_reason = Some(format!("{code}: {reason}"));
            }
        }
        Ok(self.status)
    }

    /// Authorized → Cancelled, within 24 hours of authorization
    pub async fn cancel(
        &mut self,
        authorizer: &dyn FiscalAuthorizer,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FiscalError> {
        self.ensure_status(FiscalInvoiceStatus::Authorized, "CANCELLED")?;
        let reason = reason.trim();
        if reason.chars().count() < MIN_CANCEL_REASON {
            return Err(FiscalError::ReasonTooShort);
        }
        let authorized_at = self.authorized_at.unwrap_or(self.issued_at);
        if now - authorized_at > Duration::hours(CANCEL_WINDOW_HOURS) {
            return Err(FiscalError::CancellationWindowExpired);
        }
        let (Some(key), Some(protocol)) = (&self.access_key, &self.protocol) else {
            return Err(FiscalError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: "CANCELLED".to_string(),
            });
        };

        match authorizer.cancel(key, protocol, reason).await? {
            AuthorizationResponse::Authorized { protocol } => {
                info!(invoice = %self.id, protocol = %protocol, "invoice cancelled");
                self.status = FiscalInvoiceStatus::Cancelled;
                self.cancel_reason = Some(reason.to_string());
                self.cancelled_at = Some(now);
                Ok(())
            }
            AuthorizationResponse::Rejected { code, reason } => {
                Err(FiscalError::Rejected { code, reason })
            }
        }
    }

    fn ensure_status(&self, expected: FiscalInvoiceStatus, to: &str) -> Result<(), FiscalError> {
        if self.status != expected {
            return Err(FiscalError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(qty: Decimal, price: Decimal, icms: Decimal) -> FiscalItem {
        FiscalItem {
            product_code: "ARZ-5KG".to_string(),
            description: "Arroz tipo 1 5kg".to_string(),
            ncm: "10063021".to_string(),
            cfop: "5102".to_string(),
            quantity: qty,
            unit_price: Money::brl(price),
            icms_rate: Rate::from_percentage(icms),
        }
    }

    #[test]
    fn test_item_totals() {
        let line = item(dec!(3), dec!(24.90), dec!(18));
        assert_eq!(line.total().amount(), dec!(74.70));
        assert_eq!(line.icms().amount(), dec!(13.45));
    }

    #[test]
    fn test_rejects_bad_ncm() {
        let mut bad = item(dec!(1), dec!(10), dec!(18));
        bad.ncm = "1006".to_string();
        assert!(matches!(bad.validate(), Err(FiscalError::InvalidItem(_))));
    }

    #[test]
    fn test_model_codes() {
        assert_eq!(FiscalModel::NFe.code(), 55);
        assert_eq!(FiscalModel::from_code("65"), Some(FiscalModel::NFCe));
        assert_eq!(FiscalModel::parse(FiscalModel::NFCe.as_str()), Some(FiscalModel::NFCe));
    }
}
