//! Tests for domain_investment

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Money, Rate};

use domain_investment::{
    compare, simulate, InvestmentError, InvestmentProduct, RateSpec, SimulationInput, MAX_ANNUAL_RATE,
};

fn input(product: InvestmentProduct, annual_pct: Decimal, months: u32) -> SimulationInput {
    SimulationInput {
        label: product.label().to_string(),
        product,
        initial: Money::brl(dec!(1000)),
        monthly_contribution: Money::brl(dec!(0)),
        rate: RateSpec::Annual {
            rate: Rate::from_percentage(annual_pct),
        },
        months,
    }
}

fn close_to(actual: Decimal, expected: Decimal) -> bool {
    (actual - expected).abs() <= dec!(0.01)
}

// ============================================================================
// Simulation Tests
// ============================================================================

mod simulation_tests {
    use super::*;

    #[test]
    fn test_one_year_cdb() {
        let sim = simulate(&input(InvestmentProduct::Cdb, dec!(12), 12)).unwrap();

        assert_eq!(sim.schedule.len(), 12);
        assert!(close_to(sim.gross_balance.amount(), dec!(1120.00)));
        assert!(close_to(sim.gross_interest.amount(), dec!(120.00)));
        // 360 days held: 20%
        assert_eq!(sim.tax_rate.as_percentage(), dec!(20));
        assert!(close_to(sim.income_tax.amount(), dec!(24.00)));
        assert!(close_to(sim.net_balance.amount(), dec!(1096.00)));
    }

    #[test]
    fn test_lci_is_tax_exempt() {
        let sim = simulate(&input(InvestmentProduct::Lci, dec!(12), 6)).unwrap();

        assert!(sim.income_tax.is_zero());
        assert_eq!(sim.net_balance, sim.gross_balance);
    }

    #[test]
    fn test_short_holding_taxed_at_top_rate() {
        let sim = simulate(&input(InvestmentProduct::Cdb, dec!(12), 6)).unwrap();
        assert_eq!(sim.tax_rate.as_percentage(), dec!(22.5));
    }

    #[test]
    fn test_contributions_without_yield() {
        let mut i = input(InvestmentProduct::Cdb, dec!(0), 12);
        i.initial = Money::brl(dec!(0));
        i.monthly_contribution = Money::brl(dec!(100));
        let sim = simulate(&i).unwrap();

        assert_eq!(sim.total_contributed.amount(), dec!(1200));
        assert_eq!(sim.gross_balance.amount(), dec!(1200));
        assert!(sim.gross_interest.is_zero());
    }

    #[test]
    fn test_contribution_added_after_interest() {
        let mut i = input(InvestmentProduct::Cdb, dec!(12), 2);
        i.initial = Money::brl(dec!(0));
        i.monthly_contribution = Money::brl(dec!(1000));
        let sim = simulate(&i).unwrap();

        // First month earns nothing: the deposit lands at the end of it
        assert!(sim.schedule[0].interest.is_zero());
        assert!(sim.schedule[1].interest.is_positive());
    }

    #[test]
    fn test_cdi_percentage() {
        let mut i = input(InvestmentProduct::Cdb, dec!(0), 12);
        i.rate = RateSpec::CdiPercentage {
            percentage: dec!(110),
            cdi_annual: Rate::from_percentage(dec!(10)),
        };
        let sim = simulate(&i).unwrap();

        assert!(close_to(sim.gross_interest.amount(), dec!(110.00)));
    }

    #[test]
    fn test_invalid_months() {
        assert!(matches!(
            simulate(&input(InvestmentProduct::Cdb, dec!(12), 0)),
            Err(InvestmentError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rate_above_ceiling_rejected() {
        let mut i = input(InvestmentProduct::Cdb, dec!(100000), 600);
        i.initial = Money::brl(dec!(1000000));
        assert!(matches!(simulate(&i), Err(InvestmentError::InvalidInput(_))));

        let cdi = SimulationInput {
            rate: RateSpec::CdiPercentage {
                percentage: Decimal::MAX,
                cdi_annual: Rate::from_percentage(dec!(10)),
            },
            ..input(InvestmentProduct::Cdb, dec!(0), 12)
        };
        assert!(matches!(simulate(&cdi), Err(InvestmentError::InvalidInput(_))));
    }

    #[test]
    fn test_growth_overflow_is_an_error() {
        let mut i = input(InvestmentProduct::Cdb, MAX_ANNUAL_RATE * dec!(100), 600);
        i.initial = Money::brl(dec!(1000000));
        assert!(matches!(simulate(&i), Err(InvestmentError::Calculation(_))));
    }

    #[test]
    fn test_compare_sorts_by_net() {
        let results = compare(&[
            input(InvestmentProduct::Cdb, dec!(12), 12),
            input(InvestmentProduct::Lca, dec!(11), 12),
            input(InvestmentProduct::Poupanca, dec!(6.17), 12),
        ])
        .unwrap();

        assert_eq!(results[0].input.product, InvestmentProduct::Lca);
        assert_eq!(results[1].input.product, InvestmentProduct::Cdb);
        assert_eq!(results[2].input.product, InvestmentProduct::Poupanca);
    }

    proptest! {
        #[test]
        fn net_never_below_contributions_for_positive_rates(
            pct in 1u32..30,
            months in 1u32..120,
            contribution in 0i64..100_000,
        ) {
            let mut i = input(InvestmentProduct::Cdb, Decimal::from(pct), months);
            i.monthly_contribution = Money::from_minor(contribution, core_kernel::Currency::BRL);
            let sim = simulate(&i).unwrap();

            prop_assert!(sim.net_balance >= sim.total_contributed);
            prop_assert!(sim.income_tax <= sim.gross_interest);
        }
    }
}
