//! Investment Domain - Fixed-income simulation
//!
//! Lets the owner compare where to park the store's cash: CDB, LCI/LCA,
//! Tesouro or poupança, with monthly contributions and the regressive
//! income tax table applied on redemption.
//!
//! # Rate conversion
//!
//! Annual rates are converted to the equivalent monthly rate
//! `(1 + a)^(1/12) - 1`, so twelve months of compounding reproduce the
//! annual rate exactly.

pub mod product;
pub mod tax;
pub mod simulation;
pub mod error;

pub use product::InvestmentProduct;
pub use tax::regressive_tax_rate;
pub use simulation::{compare, simulate, MonthRow, RateSpec, Simulation, SimulationInput, MAX_ANNUAL_RATE};
pub use error::InvestmentError;

use rust_decimal::{Decimal, MathematicalOps};

/// Rate precision used in intermediate computations
pub const RATE_PRECISION: u32 = 10;

/// Equivalent monthly rate of an annual rate, both as fractions
pub fn monthly_rate(annual: Decimal) -> Decimal {
    if annual.is_zero() {
        return Decimal::ZERO;
    }
    let exponent = Decimal::ONE / Decimal::from(12);
    ((Decimal::ONE + annual).powd(exponent) - Decimal::ONE).round_dp(RATE_PRECISION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_monthly_rate_compounds_back_to_annual() {
        let monthly = monthly_rate(dec!(0.12));
        assert!((monthly - dec!(0.0094887929)).abs() < dec!(0.0000001));

        let annual = (Decimal::ONE + monthly).powi(12) - Decimal::ONE;
        assert!((annual - dec!(0.12)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_zero_rate() {
        assert_eq!(monthly_rate(Decimal::ZERO), Decimal::ZERO);
    }
}
