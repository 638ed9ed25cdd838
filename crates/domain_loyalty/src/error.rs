//! Loyalty domain errors

use thiserror::Error;

use core_kernel::Money;

#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("Redemption of {requested} points is below the minimum of {minimum}")]
    BelowMinimumRedemption {
        minimum: u64,
        requested: u64,
    },

    #[error("Insufficient points: balance {balance}, requested {requested}")]
    InsufficientPoints {
        balance: u64,
        requested: u64,
    },

    #[error("A customer cannot refer themselves")]
    SelfReferral,

    #[error("Customer was already referred: {0}")]
    AlreadyReferred(String),

    #[error("First order {total} is below the referral minimum {minimum}")]
    OrderBelowMinimum {
        minimum: Money,
        total: Money,
    },

    #[error("Invalid referral transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("Account belongs to another customer: {0}")]
    WrongAccount(String),
}
