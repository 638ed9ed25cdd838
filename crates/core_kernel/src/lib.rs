//! Core Kernel - Foundational types shared by every atacarejo domain
//!
//! This crate provides the building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic (BRL first)
//! - Strongly-typed identifiers and the tenant context
//! - Business calendar and timezone handling for local time windows
//! - Brazilian document validation (CPF / CNPJ)
//! - Port contracts for external adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod documents;
pub mod tenant;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, MoneyError, Rate};
pub use temporal::{BusinessCalendar, DateRange, Timezone, TemporalError};
pub use identifiers::{
    TenantId, UserId, CustomerId, ProductId, OrderId, OrderItemId,
    BankAccountId, FinancialEntryId, ReceivableId, BoletoId, ClosingId,
    EmployeeId, PayrollId, LoyaltyAccountId, ReferralId, SimulationId,
    FiscalInvoiceId, MessageId,
};
pub use documents::{Cpf, Cnpj, DocumentError, TaxDocument};
pub use tenant::{TenantContext, Role};
pub use ports::{
    PortError, DomainPort, CircuitBreakerConfig, AdapterHealth,
    HealthCheckResult, HealthCheckable,
};
pub use error::CoreError;
