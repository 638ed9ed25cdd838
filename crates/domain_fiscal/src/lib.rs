//! Fiscal Domain - Electronic invoices
//!
//! Sales to companies are documented with an NF-e (model 55) and counter
//! sales with an NFC-e (model 65). Both are identified by a 44-digit access
//! key and must be authorized by the state tax authority (SEFAZ) before the
//! goods leave the store.
//!
//! Authorization goes through the [`FiscalAuthorizer`] port. Talking to the
//! real SEFAZ web services is left to an adapter; [`HomologationAuthorizer`]
//! performs the same schema checks locally and is what tests and the
//! default deployment use.

pub mod access_key;
pub mod invoice;
pub mod authorizer;
pub mod error;

pub use access_key::AccessKey;
pub use invoice::{FiscalInvoice, FiscalInvoiceStatus, FiscalItem, FiscalModel, FiscalTotals};
pub use authorizer::{AuthorizationResponse, FiscalAuthorizer, HomologationAuthorizer};
pub use error::FiscalError;
