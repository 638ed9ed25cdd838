//! Referrals ("indique e ganhe")

use chrono::{DateTime, Duration, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use core_kernel::{CustomerId, Money, ReferralId, TenantId};
use crate::account::LoyaltyAccount;
use crate::error::LoyaltyError;
use crate::program::LoyaltyProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferralStatus {
    Pending,
    Qualified,
    Rewarded,
    Expired,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "PENDING",
            ReferralStatus::Qualified => "QUALIFIED",
            ReferralStatus::Rewarded => "REWARDED",
            ReferralStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(ReferralStatus::Pending),
            "QUALIFIED" => Some(ReferralStatus::Qualified),
            "REWARDED" => Some(ReferralStatus::Rewarded),
            "EXPIRED" => Some(ReferralStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: ReferralId,
    pub tenant_id: TenantId,
    pub referrer_id: CustomerId,
    pub referred_id: CustomerId,
    pub code: String,
    pub status: ReferralStatus,
    pub reward_points: u64,
    pub created_at: DateTime<Utc>,
    pub qualified_at: Option<DateTime<Utc>>,
    pub rewarded_at: Option<DateTime<Utc>>,
}

impl Referral {
    /// Registers a referral
    ///
    /// `existing` holds the tenant's referrals for the referred customer, if any.
    pub fn register(
        tenant_id: TenantId,
        referrer_id: CustomerId,
        referred_id: CustomerId,
        code: impl Into<String>,
        existing: &[Referral],
        now: DateTime<Utc>,
    ) -> Result<Self, LoyaltyError> {
        if referrer_id == referred_id {
            return Err(LoyaltyError::SelfReferral);
        }
        if existing
            .iter()
            .any(|r| r.referred_id == referred_id && r.status != ReferralStatus::Expired)
        {
            return Err(LoyaltyError::AlreadyReferred(referred_id.to_string()));
        }
        Ok(Self {
            id: ReferralId::new_v7(),
            tenant_id,
            referrer_id,
            referred_id,
            code: code.into(),
            status: ReferralStatus::Pending,
            reward_points: 0,
            created_at: now,
            qualified_at: None,
            rewarded_at: None,
        })
    }

    /// Pending → Qualified on the referred customer's first paid order
    pub fn qualify(
        &mut self,
        first_order_total: &Money,
        program: &LoyaltyProgram,
        at: DateTime<Utc>,
    ) -> Result<(), LoyaltyError> {
        self.ensure(ReferralStatus::Pending, ReferralStatus::Qualified)?;
        if *first_order_total < program.referral_min_order {
            return Err(LoyaltyError::OrderBelowMinimum {
                minimum: program.referral_min_order,
                total: *first_order_total,
            });
        }
        self.status = ReferralStatus::Qualified;
        self.qualified_at = Some(at);
        Ok(())
    }

    /// Qualified → Rewarded, crediting the referrer's account
    pub fn reward(
        &mut self,
        referrer_account: &mut LoyaltyAccount,
        program: &LoyaltyProgram,
        at: DateTime<Utc>,
    ) -> Result<u64, LoyaltyError> {
        self.ensure(ReferralStatus::Qualified, ReferralStatus::Rewarded)?;
        if referrer_account.customer_id != self.referrer_id {
            return Err(LoyaltyError::WrongAccount(referrer_account.id.to_string()));
        }
        let points = program.referral_reward_points;
        referrer_account.credit(points, program);
        self.status = ReferralStatus::Rewarded;
        self.reward_points = points;
        self.rewarded_at = Some(at);
        info!(referral = %self.id, points, "referral rewarded");
        Ok(points)
    }

    /// Expires a pending referral past the program window; returns whether it changed
    pub fn expire_if_stale(&mut self, now: DateTime<Utc>, program: &LoyaltyProgram) -> bool {
        let deadline = self.created_at + Duration::days(program.referral_expiry_days);
        if self.status == ReferralStatus::Pending && now > deadline {
            self.status = ReferralStatus::Expired;
            true
        } else {
            false
        }
    }

    fn ensure(&self, expected: ReferralStatus, to: ReferralStatus) -> Result<(), LoyaltyError> {
        if self.status != expected {
            return Err(LoyaltyError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(())
    }
}

/// Builds a shareable code such as `JOAO-7K2Q`
pub fn generate_referral_code(name: &str) -> String {
    let mut prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_ascii_uppercase();
    if prefix.is_empty() {
        prefix.push_str("CLI");
    }
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{prefix}-{suffix}")
}
