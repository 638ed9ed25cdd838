//! Sales domain errors

use thiserror::Error;

use core_kernel::{Money, MoneyError};
use crate::order::OrderStatus;

/// Errors that can occur in the sales domain
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Invalid order transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Order has no items")]
    EmptyOrder,

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Product is inactive: {0}")]
    InactiveProduct(String),

    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal {
        discount: Money,
        subtotal: Money,
    },

    #[error("Wholesale orders must reach {minimum}, got {total}")]
    BelowMinimumOrder {
        minimum: Money,
        total: Money,
    },

    #[error("Edit window closed at {0}")]
    EditWindowClosed(String),

    #[error("Credit limit exceeded: available {available}, requested {requested}")]
    CreditLimitExceeded {
        available: Money,
        requested: Money,
    },

    #[error("Invalid payment terms: {0}")]
    InvalidPaymentTerms(String),

    #[error("Customer is inactive")]
    InactiveCustomer,

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}
