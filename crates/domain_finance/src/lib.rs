//! Finance Domain - Ledger, receivables and boletos
//!
//! Every movement of money in a tenant's bank accounts is a
//! [`FinancialEntry`]. Entries start Pending and only change a bank balance
//! when settled; history is never edited, a settled entry is undone by
//! posting its reversal.
//!
//! # Boleto lifecycle
//!
//! ```text
//!            mark_overdue
//! PENDING ────────────────► OVERDUE
//!    │  ▲                      │
//!    │  └── reverse_payment ───┤ (back to OVERDUE if already late)
//!    │          ▲              │
//!    ├──► PAID ─┘ ◄────────────┤ pay
//!    │                         │
//!    └──► CANCELLED ◄──────────┘ cancel
//! ```
//!
//! Paying a boleto settles its receivable and produces the ledger entries
//! (principal as Sales income, fine and interest as LateFees) that credit
//! the collecting bank account.

pub mod bank_account;
pub mod entry;
pub mod ledger;
pub mod receivable;
pub mod febraban;
pub mod boleto;
pub mod overdue;
pub mod closing;
pub mod dre;
pub mod error;

pub use bank_account::{BankAccount, BankAccountKind};
pub use entry::{DreLine, EntryCategory, EntryKind, EntryStatus, FinancialEntry};
pub use ledger::{Ledger, Reconciliation};
pub use receivable::{Receivable, ReceivableStatus};
pub use boleto::{Boleto, BoletoIssuer, BoletoPayment, BoletoStatus};
pub use overdue::{OverdueSweep, SweepReport};
pub use closing::{AccountSummary, ClosingBuilder, ClosingStatus, FinancialClosing};
pub use dre::DreReport;
pub use error::FinanceError;
