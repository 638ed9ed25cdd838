//! Loyalty Domain - Points and referrals
//!
//! Customers earn points on paid orders and redeem them as discounts on
//! later orders. Tiers follow lifetime points, so redeeming never demotes a
//! customer. Referrals reward the referrer once the referred customer's
//! first paid order reaches the program minimum.

pub mod program;
pub mod account;
pub mod referral;
pub mod error;

pub use program::LoyaltyProgram;
pub use account::{LoyaltyAccount, Tier};
pub use referral::{generate_referral_code, Referral, ReferralStatus};
pub use error::LoyaltyError;
