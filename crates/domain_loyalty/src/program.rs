//! Program settings

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::Money;

/// Per-tenant loyalty settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyProgram {
    pub points_per_real: Decimal,
    /// Discount each point is worth
    pub redemption_value: Money,
    pub min_redemption: u64,
    pub silver_threshold: u64,
    pub gold_threshold: u64,
    pub referral_reward_points: u64,
    /// First paid order the referred customer must reach
    pub referral_min_order: Money,
    /// Days a pending referral stays valid
    pub referral_expiry_days: i64,
}

impl Default for LoyaltyProgram {
    fn default() -> Self {
        Self {
            points_per_real: dec!(1),
            redemption_value: Money::brl(dec!(0.05)),
            min_redemption: 100,
            silver_threshold: 1_000,
            gold_threshold: 5_000,
            referral_reward_points: 500,
            referral_min_order: Money::brl(dec!(100)),
            referral_expiry_days: 90,
        }
    }
}
