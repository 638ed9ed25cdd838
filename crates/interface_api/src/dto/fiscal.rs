//! NF-e / NFC-e issuance

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{non_negative, positive};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct FiscalItemRequest {
    #[validate(length(min = 1, max = 60))]
    pub product_code: String,
    #[validate(length(min = 1, max = 120))]
    pub description: String,
    #[validate(length(equal = 8))]
    pub ncm: String,
    #[validate(length(equal = 4))]
    pub cfop: String,
    #[validate(custom(function = "positive"))]
    pub quantity: Decimal,
    #[validate(custom(function = "positive"))]
    pub unit_price: Decimal,
    /// ICMS rate in percent, e.g. 18
    #[validate(custom(function = "non_negative"))]
    pub icms_rate: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IssueInvoiceRequest {
    /// `NFE` or `NFCE`
    pub model: String,
    pub order_id: Option<Uuid>,
    /// Recipient CPF or CNPJ; required for NF-e
    pub recipient_document: Option<String>,
    #[validate(length(min = 1, max = 990), nested)]
    pub items: Vec<FiscalItemRequest>,
}
