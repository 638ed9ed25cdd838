//! Tests for domain_fiscal

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Cnpj, Money, PortError, Rate, TaxDocument, TenantId};

use domain_fiscal::{
    AccessKey, AuthorizationResponse, FiscalAuthorizer, FiscalError, FiscalInvoice,
    FiscalInvoiceStatus, FiscalItem, FiscalModel, HomologationAuthorizer,
};

fn issuer() -> Cnpj {
    Cnpj::parse("11.222.333/0001-81").unwrap()
}

fn item(qty: Decimal, price: Decimal) -> FiscalItem {
    FiscalItem {
        product_code: "OLEO-900".to_string(),
        description: "Óleo de soja 900ml".to_string(),
        ncm: "15079011".to_string(),
        cfop: "5102".to_string(),
        quantity: qty,
        unit_price: Money::brl(price),
        icms_rate: Rate::from_percentage(dec!(12)),
    }
}

fn nfce(number: u32) -> FiscalInvoice {
    let mut invoice = FiscalInvoice::new(TenantId::new(), FiscalModel::NFCe, 1, number, issuer(), 35);
    invoice.add_item(item(dec!(10), dec!(7.99))).unwrap();
    invoice.add_item(item(dec!(2), dec!(5.00))).unwrap();
    invoice
}

struct RejectingAuthorizer;

#[async_trait]
impl FiscalAuthorizer for RejectingAuthorizer {
    async fn authorize(&self, _invoice: &FiscalInvoice) -> Result<AuthorizationResponse, PortError> {
        Ok(AuthorizationResponse::Rejected {
            code: 778,
            reason: "NCM inexistente".to_string(),
        })
    }

    async fn cancel(&self, _: &AccessKey, _: &str, _: &str) -> Result<AuthorizationResponse, PortError> {
        Err(PortError::ServiceUnavailable {
            service: "sefaz".to_string(),
        })
    }
}

// ============================================================================
// Totals Tests
// ============================================================================

mod totals_tests {
    use super::*;

    #[test]
    fn test_totals_sum_items() {
        let invoice = nfce(1);

        assert_eq!(invoice.totals.products.amount(), dec!(89.90));
        // 79.90 * 12% = 9.588 -> 9.59, 10.00 * 12% = 1.20
        assert_eq!(invoice.totals.icms.amount(), dec!(10.79));
        assert_eq!(invoice.totals.total.amount(), dec!(89.90));
    }

    #[test]
    fn test_empty_invoice_is_invalid() {
        let invoice = FiscalInvoice::new(TenantId::new(), FiscalModel::NFCe, 1, 1, issuer(), 35);
        assert!(matches!(invoice.validate(), Err(FiscalError::EmptyInvoice)));
    }

    #[test]
    fn test_nfe_needs_recipient() {
        let mut invoice = FiscalInvoice::new(TenantId::new(), FiscalModel::NFe, 1, 1, issuer(), 35);
        invoice.add_item(item(dec!(1), dec!(10))).unwrap();
        assert!(matches!(invoice.validate(), Err(FiscalError::MissingRecipient)));

        let invoice = invoice.with_recipient(TaxDocument::parse("529.982.247-25").unwrap());
        assert!(invoice.validate().is_ok());
    }
}

// ============================================================================
// Authorization Tests
// ============================================================================

mod authorization_tests {
    use super::*;

    #[tokio::test]
    async fn test_authorize_assigns_key_and_protocol() {
        let authorizer = HomologationAuthorizer::new();
        let mut invoice = nfce(42);

        let status = invoice.authorize(&authorizer, Utc::now()).await.unwrap();

        assert_eq!(status, FiscalInvoiceStatus::Authorized);
        let key = invoice.access_key.clone().unwrap();
        assert_eq!(key.digits().len(), 44);
        assert_eq!(key.model(), Some(FiscalModel::NFCe));
        assert_eq!(key.number(), 42);
        assert!(AccessKey::parse(key.digits()).is_ok());
        assert!(invoice.protocol.is_some());
        assert!(invoice.authorized_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_number_rejected() {
        let authorizer = HomologationAuthorizer::new();
        let mut first = nfce(7);
        let mut second = nfce(7);

        first.authorize(&authorizer, Utc::now()).await.unwrap();
        let status = second.authorize(&authorizer, Utc::now()).await.unwrap();

        assert_eq!(status, FiscalInvoiceStatus::Rejected);
        assert!(second.rejection_reason.unwrap().starts_with("539"));
    }

    #[tokio::test]
    async fn test_rejection_is_recorded() {
        let mut invoice = nfce(1);
        let status = invoice.authorize(&RejectingAuthorizer, Utc::now()).await.unwrap();

        assert_eq!(status, FiscalInvoiceStatus::Rejected);
        assert_eq!(invoice.rejection_reason.as_deref(), Some("778: NCM inexistente"));
        assert!(invoice.protocol.is_none());
    }

    #[tokio::test]
    async fn test_cannot_add_items_after_authorization() {
        let authorizer = HomologationAuthorizer::new();
        let mut invoice = nfce(3);
        invoice.authorize(&authorizer, Utc::now()).await.unwrap();

        assert!(matches!(
            invoice.add_item(item(dec!(1), dec!(1))),
            Err(FiscalError::InvalidTransition { .. })
        ));
    }
}

// ============================================================================
// Cancellation Tests
// ============================================================================

mod cancellation_tests {
    use super::*;

    const REASON: &str = "Pedido cancelado pelo cliente";

    #[tokio::test]
    async fn test_cancel_within_window() {
        let authorizer = HomologationAuthorizer::new();
        let mut invoice = nfce(10);
        let authorized = Utc::now();
        invoice.authorize(&authorizer, authorized).await.unwrap();

        invoice
            .cancel(&authorizer, REASON, authorized + Duration::hours(23))
            .await
            .unwrap();

        assert_eq!(invoice.status, FiscalInvoiceStatus::Cancelled);
        assert_eq!(invoice.cancel_reason.as_deref(), Some(REASON));
    }

    #[tokio::test]
    async fn test_cancel_after_window() {
        let authorizer = HomologationAuthorizer::new();
        let mut invoice = nfce(11);
        let authorized = Utc::now();
        invoice.authorize(&authorizer, authorized).await.unwrap();

        let result = invoice
            .cancel(&authorizer, REASON, authorized + Duration::hours(25))
            .await;

        assert!(matches!(result, Err(FiscalError::CancellationWindowExpired)));
        assert_eq!(invoice.status, FiscalInvoiceStatus::Authorized);
    }

    #[tokio::test]
    async fn test_cancel_reason_too_short() {
        let authorizer = HomologationAuthorizer::new();
        let mut invoice = nfce(12);
        invoice.authorize(&authorizer, Utc::now()).await.unwrap();

        let result = invoice.cancel(&authorizer, "erro", Utc::now()).await;
        assert!(matches!(result, Err(FiscalError::ReasonTooShort)));
    }

    #[tokio::test]
    async fn test_cannot_cancel_draft() {
        let authorizer = HomologationAuthorizer::new();
        let mut invoice = nfce(13);

        let result = invoice.cancel(&authorizer, REASON, Utc::now()).await;
        assert!(matches!(result, Err(FiscalError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_authorizer_outage_surfaces_port_error() {
        let mut invoice = nfce(14);
        invoice.authorize(&HomologationAuthorizer::new(), Utc::now()).await.unwrap();

        let result = invoice.cancel(&RejectingAuthorizer, REASON, Utc::now()).await;
        assert!(matches!(result, Err(FiscalError::Port(_))));
        assert_eq!(invoice.status, FiscalInvoiceStatus::Authorized);
    }
}
