//! Loyalty points and referrals

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_loyalty::LoyaltyAccount;

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemRequest {
    #[validate(range(min = 1))]
    pub points: u64,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub account: LoyaltyAccount,
    /// Discount the points are worth at checkout
    pub discount: Money,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterReferralRequest {
    /// Referral code of the customer who brought the new one
    #[validate(length(min = 4, max = 20))]
    pub code: String,
    pub referred_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ExpiredReferralsResponse {
    pub expired: usize,
}
