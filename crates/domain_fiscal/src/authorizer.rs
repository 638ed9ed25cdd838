//! Authorization port

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::PortError;
use crate::access_key::AccessKey;
use crate::invoice::FiscalInvoice;

/// SEFAZ answer to an authorization or cancellation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuthorizationResponse {
    Authorized { protocol: String },
    Rejected { code: u16, reason: String },
}

/// Port to the tax authority
#[async_trait]
pub trait FiscalAuthorizer: Send + Sync {
    /// Sends the invoice for authorization ("autorização de uso")
    async fn authorize(&self, invoice: &FiscalInvoice) -> Result<AuthorizationResponse, PortError>;

    /// Registers a cancellation event for an authorized invoice
    async fn cancel(
        &self,
        access_key: &AccessKey,
        protocol: &str,
        reason: &str,
    ) -> Result<AuthorizationResponse, PortError>;
}

/// Local authorizer mirroring the SEFAZ homologation environment
///
/// Applies the structural checks SEFAZ performs and rejects duplicate
/// numbers (status 539) without any network access.
#[derive(Debug, Default)]
pub struct HomologationAuthorizer {
    sequence: AtomicU64,
    used_numbers: Mutex<HashSet<(String, u8, u16, u32)>>,
}

impl HomologationAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_protocol(&self, uf: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{uf}{:02}{seq:011}", Utc::now().year() % 100)
    }
}

#[async_trait]
impl FiscalAuthorizer for HomologationAuthorizer {
    async fn authorize(&self, invoice: &FiscalInvoice) -> Result<AuthorizationResponse, PortError> {
        let Some(key) = &invoice.access_key else {
            return Ok(AuthorizationResponse::Rejected {
                code: 236,
                reason: "Chave de acesso ausente".to_string(),
            });
        };
        if key.issuer_cnpj() != invoice.issuer_cnpj.digits() {
            return Ok(AuthorizationResponse::Rejected {
                code: 207,
                reason: "CNPJ do emitente difere da chave de acesso".to_string(),
            });
        }
        if !invoice.totals.total.is_positive() {
            return Ok(AuthorizationResponse::Rejected {
                code: 610,
                reason: "Total da NF difere do somatório dos itens".to_string(),
            });
        }

        let number = (
            invoice.issuer_cnpj.digits().to_string(),
            invoice.model.code(),
            invoice.series,
            invoice.number,
        );
        let inserted = self
            .used_numbers
            .lock()
            .map_err(|_| PortError::internal("authorizer state poisoned"))?
            .insert(number);
        if !inserted {
            return Ok(AuthorizationResponse::Rejected {
                code: 539,
                reason: "Duplicidade de NF-e".to_string(),
            });
        }

        let protocol = self.next_protocol(key.uf_code());
        debug!(key = %key.digits(), protocol = %protocol, "homologation authorization");
        Ok(AuthorizationResponse::Authorized { protocol })
    }

    async fn cancel(
        &self,
        access_key: &AccessKey,
        protocol: &str,
        _reason: &str,
    ) -> Result<AuthorizationResponse, PortError> {
        if protocol.is_empty() {
            return Ok(AuthorizationResponse::Rejected {
                code: 217,
                reason: "NF-e não consta na base de dados da SEFAZ".to_string(),
            });
        }
        Ok(AuthorizationResponse::Authorized {
            protocol: self.next_protocol(access_key.uf_code()),
        })
    }
}
