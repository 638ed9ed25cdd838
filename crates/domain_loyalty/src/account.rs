//! Points accounts and tiers

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CustomerId, LoyaltyAccountId, Money, TenantId};
use crate::error::LoyaltyError;
use crate::program::LoyaltyProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub fn for_lifetime_points(points: u64, program: &LoyaltyProgram) -> Tier {
        if points >= program.gold_threshold {
            Tier::Gold
        } else if points >= program.silver_threshold {
            Tier::Silver
        } else {
            Tier::Bronze
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bronze" => Some(Tier::Bronze),
            "silver" => Some(Tier::Silver),
            "gold" => Some(Tier::Gold),
            _ => None,
        }
    }
}

/// A customer's points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub id: LoyaltyAccountId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub points_balance: u64,
    pub lifetime_points: u64,
    pub tier: Tier,
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyAccount {
    pub fn open(tenant_id: TenantId, customer_id: CustomerId) -> Self {
        Self {
            id: LoyaltyAccountId::new_v7(),
            tenant_id,
            customer_id,
            points_balance: 0,
            lifetime_points: 0,
            tier: Tier::Bronze,
            updated_at: Utc::now(),
        }
    }

    /// Points earned on a paid order total (rounded down)
    pub fn points_for(order_total: &Money, program: &LoyaltyProgram) -> u64 {
        let points = (order_total.amount() * program.points_per_real).floor();
        if points <= Decimal::ZERO {
            0
        } else {
            points.to_u64().unwrap_or(0)
        }
    }

    /// Credits points for a paid order and returns how many were earned
    pub fn earn(&mut self, order_total: &Money, program: &LoyaltyProgram) -> u64 {
        let points = Self::points_for(order_total, program);
        self.credit(points, program);
        points
    }

    /// Credits bonus points (referral rewards, campaigns)
    pub fn credit(&mut self, points: u64, program: &LoyaltyProgram) {
        self.points_balance = self.points_balance.saturating_add(points);
        self.lifetime_points = self.lifetime_points.saturating_add(points);
        self.tier = Tier::for_lifetime_points(self.lifetime_points, program);
        self.updated_at = Utc::now();
    }

    /// Spends points and returns the discount they are worth
    pub fn redeem(&mut self, points: u64, program: &LoyaltyProgram) -> Result<Money, LoyaltyError> {
        if points < program.min_redemption {
            return Err(LoyaltyError::BelowMinimumRedemption {
                minimum: program.min_redemption,
                requested: points,
            });
        }
        if points > self.points_balance {
            return Err(LoyaltyError::InsufficientPoints {
                balance: self.points_balance,
                requested: points,
            });
        }
        self.points_balance -= points;
        self.updated_at = Utc::now();
        Ok(program.redemption_value.multiply(Decimal::from(points)).round_to_currency())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_points_round_down() {
        let program = LoyaltyProgram::default();
        assert_eq!(LoyaltyAccount::points_for(&Money::brl(dec!(99.99)), &program), 99);
        assert_eq!(LoyaltyAccount::points_for(&Money::brl(dec!(0.50)), &program), 0);
    }

    #[test]
    fn test_tier_thresholds() {
        let program = LoyaltyProgram::default();
        assert_eq!(Tier::for_lifetime_points(999, &program), Tier::Bronze);
        assert_eq!(Tier::for_lifetime_points(1_000, &program), Tier::Silver);
        assert_eq!(Tier::for_lifetime_points(5_000, &program), Tier::Gold);
    }
}
