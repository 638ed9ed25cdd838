//! Bank accounts, ledger entries, receivables, boletos and closings

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_finance::{Boleto, BoletoPayment, FinancialEntry};

use super::{non_negative, positive};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBankAccountRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    /// `checking`, `savings`, `cash` or `payment_provider`
    pub kind: String,
    pub opening_balance: Option<Decimal>,
    /// FEBRABAN bank code, needed for boletos
    #[validate(length(equal = 3))]
    pub bank_code: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub agency: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferRequest {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    /// Competence date; today in the tenant's timezone when absent
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub outgoing: FinancialEntry,
    pub incoming: FinancialEntry,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntryRequest {
    pub bank_account_id: Uuid,
    /// `income` or `expense`
    pub kind: String,
    pub category: String,
    #[validate(length(min = 1, max = 200))]
    pub description: String,
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    pub competence_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    /// Settle right away instead of leaving the entry pending
    #[serde(default)]
    pub settle: bool,
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub bank_account_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ClosePeriodRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ReceivableQuery {
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReceivablePaymentRequest {
    pub bank_account_id: Uuid,
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    /// Late fees and interest collected on top of the principal
    #[validate(custom(function = "non_negative"))]
    pub charges: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct IssueBoletoRequest {
    pub bank_account_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PayBoletoRequest {
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BoletoPaymentResponse {
    pub boleto: Boleto,
    pub payment: BoletoPayment,
}

/// A boleto with the amount due today including late charges
#[derive(Debug, Serialize)]
pub struct BoletoResponse {
    #[serde(flatten)]
    pub boleto: Boleto,
    pub formatted_line: String,
    pub amount_due_today: Money,
}
