//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for every atacarejo domain, built on SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: each domain gets a repository
//! that maps rows to domain types and back. Every query is scoped by
//! [`core_kernel::TenantId`].
//!
//! Flows that move money (confirming credit sales, paying or reversing a
//! boleto, transfers, payroll payouts, closings) run in one transaction:
//! rows are locked, the domain rule is applied and entries and balances are
//! written together.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, FinanceRepository};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/atacarejo")).await?;
//! run_migrations(&pool).await?;
//! let finance = FinanceRepository::new(pool);
//! let report = finance.run_overdue_sweep_all(Utc::now(), &OverdueSweep::new(0)).await?;
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use repositories::{
    ConfirmedReceivables, FinanceRepository, FiscalRepository, HrRepository, LoyaltyRepository,
    MessagingRepository, OrderRepository, PointsAwarded, TenantRecord, TenantRepository,
};
pub use adapters::PostgresHealthAdapter;
