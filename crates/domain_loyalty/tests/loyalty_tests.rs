//! Tests for domain_loyalty

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal_macros::dec;

use core_kernel::{CustomerId, Currency, Money, TenantId};

use domain_loyalty::{
    generate_referral_code, LoyaltyAccount, LoyaltyError, LoyaltyProgram, Referral,
    ReferralStatus, Tier,
};

// ============================================================================
// Points Tests
// ============================================================================

mod points_tests {
    use super::*;

    #[test]
    fn test_earn_and_promote() {
        let program = LoyaltyProgram::default();
        let mut account = LoyaltyAccount::open(TenantId::new(), CustomerId::new());

        assert_eq!(account.earn(&Money::brl(dec!(850.90)), &program), 850);
        assert_eq!(account.tier, Tier::Bronze);

        account.earn(&Money::brl(dec!(200)), &program);
        assert_eq!(account.lifetime_points, 1_050);
        assert_eq!(account.tier, Tier::Silver);
    }

    #[test]
    fn test_redeem_converts_to_discount() {
        let program = LoyaltyProgram::default();
        let mut account = LoyaltyAccount::open(TenantId::new(), CustomerId::new());
        account.earn(&Money::brl(dec!(500)), &program);

        let discount = account.redeem(200, &program).unwrap();
        assert_eq!(discount.amount(), dec!(10.00));
        assert_eq!(account.points_balance, 300);
        assert_eq!(account.lifetime_points, 500);
    }

    #[test]
    fn test_redeem_below_minimum() {
        let program = LoyaltyProgram::default();
        let mut account = LoyaltyAccount::open(TenantId::new(), CustomerId::new());
        account.earn(&Money::brl(dec!(500)), &program);

        assert!(matches!(
            account.redeem(99, &program),
            Err(LoyaltyError::BelowMinimumRedemption { minimum: 100, requested: 99 })
        ));
    }

    #[test]
    fn test_redeem_above_balance() {
        let program = LoyaltyProgram::default();
        let mut account = LoyaltyAccount::open(TenantId::new(), CustomerId::new());
        account.earn(&Money::brl(dec!(150)), &program);

        assert!(matches!(
            account.redeem(200, &program),
            Err(LoyaltyError::InsufficientPoints { .. })
        ));
    }

    #[test]
    fn test_redeeming_never_demotes() {
        let program = LoyaltyProgram::default();
        let mut account = LoyaltyAccount::open(TenantId::new(), CustomerId::new());
        account.earn(&Money::brl(dec!(6000)), &program);
        account.redeem(5_500, &program).unwrap();

        assert_eq!(account.tier, Tier::Gold);
    }

    proptest! {
        #[test]
        fn balance_never_exceeds_lifetime(orders in prop::collection::vec(0i64..1_000_000, 1..20)) {
            let program = LoyaltyProgram::default();
            let mut account = LoyaltyAccount::open(TenantId::new(), CustomerId::new());
            for cents in orders {
                account.earn(&Money::from_minor(cents, Currency::BRL), &program);
                if account.points_balance >= 100 {
                    account.redeem(100, &program).unwrap();
                }
            }
            prop_assert!(account.points_balance <= account.lifetime_points);
        }
    }
}

// ============================================================================
// Referral Tests
// ============================================================================

mod referral_tests {
    use super::*;

    #[test]
    fn test_referral_lifecycle() {
        let program = LoyaltyProgram::default();
        let tenant = TenantId::new();
        let referrer = CustomerId::new();
        let mut referrer_account = LoyaltyAccount::open(tenant, referrer);

        let mut referral =
            Referral::register(tenant, referrer, CustomerId::new(), "MARI-AB12", &[], Utc::now()).unwrap();
        referral.qualify(&Money::brl(dec!(150)), &program, Utc::now()).unwrap();
        let points = referral.reward(&mut referrer_account, &program, Utc::now()).unwrap();

        assert_eq!(points, 500);
        assert_eq!(referral.status, ReferralStatus::Rewarded);
        assert_eq!(referrer_account.points_balance, 500);
    }

    #[test]
    fn test_self_referral_rejected() {
        let customer = CustomerId::new();
        let result = Referral::register(TenantId::new(), customer, customer, "X", &[], Utc::now());
        assert!(matches!(result, Err(LoyaltyError::SelfReferral)));
    }

    #[test]
    fn test_one_referral_per_referred_customer() {
        let tenant = TenantId::new();
        let referred = CustomerId::new();
        let first = Referral::register(tenant, CustomerId::new(), referred, "A", &[], Utc::now()).unwrap();

        let result = Referral::register(tenant, CustomerId::new(), referred, "B", &[first], Utc::now());
        assert!(matches!(result, Err(LoyaltyError::AlreadyReferred(_))));
    }

    #[test]
    fn test_small_first_order_does_not_qualify() {
        let program = LoyaltyProgram::default();
        let mut referral =
            Referral::register(TenantId::new(), CustomerId::new(), CustomerId::new(), "A", &[], Utc::now()).unwrap();

        assert!(referral.qualify(&Money::brl(dec!(99.99)), &program, Utc::now()).is_err());
        assert_eq!(referral.status, ReferralStatus::Pending);
    }

    #[test]
    fn test_reward_requires_qualification() {
        let program = LoyaltyProgram::default();
        let tenant = TenantId::new();
        let referrer = CustomerId::new();
        let mut account = LoyaltyAccount::open(tenant, referrer);
        let mut referral = Referral::register(tenant, referrer, CustomerId::new(), "A", &[], Utc::now()).unwrap();

        assert!(matches!(
            referral.reward(&mut account, &program, Utc::now()),
            Err(LoyaltyError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_stale_referral_expires() {
        let program = LoyaltyProgram::default();
        let created = Utc::now() - Duration::days(91);
        let mut referral =
            Referral::register(TenantId::new(), CustomerId::new(), CustomerId::new(), "A", &[], created).unwrap();

        assert!(referral.expire_if_stale(Utc::now(), &program));
        assert_eq!(referral.status, ReferralStatus::Expired);
        assert!(!referral.expire_if_stale(Utc::now(), &program));
    }

    #[test]
    fn test_referral_code_format() {
        let code = generate_referral_code("Maria Oliveira");
        assert!(code.starts_with("MARI-"));
        assert_eq!(code.len(), 9);
        assert!(code.chars().all(|c| c == '-' || c.is_ascii_uppercase() || c.is_ascii_digit()));

        assert!(generate_referral_code("***").starts_with("CLI-"));
    }
}
