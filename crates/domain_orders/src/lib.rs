//! Sales Domain - Orders for a wholesale/retail food distributor
//!
//! An "atacarejo" sells the same catalogue to restaurants (wholesale) and to
//! walk-in customers (retail). Retail customers buying above a product's
//! minimum quantity also get the wholesale price.
//!
//! # Order lifecycle
//!
//! ```text
//! Draft ──► Confirmed ──► Preparing ──► OutForDelivery ──► Delivered
//!   │           │             │
//!   └───────────┴─────────────┴──► Cancelled
//! ```
//!
//! Confirmed and Preparing orders may only be cancelled while the edit
//! window before the delivery date is open (see [`BusinessRules`]).

pub mod customer;
pub mod product;
pub mod order;
pub mod business_rules;
pub mod error;

pub use customer::{Customer, CustomerType};
pub use product::{Product, PriceTier, Unit};
pub use order::{Order, OrderItem, OrderStatus, PaymentMethod, Installment};
pub use business_rules::BusinessRules;
pub use error::OrderError;
