//! Withholding tables
//!
//! Values published for 2024. Tenants can replace them when the government
//! updates the brackets; nothing else in the payroll depends on the numbers.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::Rate;

/// INSS bracket; the rate applies to the slice of salary up to `up_to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InssBracket {
    pub up_to: Decimal,
    pub rate: Rate,
}

/// IRRF bracket with its flat deduction; `up_to: None` is the top bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrrfBracket {
    pub up_to: Option<Decimal>,
    pub rate: Rate,
    pub deduction: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollTables {
    /// Progressive brackets; salary above the last one is not taxed (ceiling)
    pub inss: Vec<InssBracket>,
    pub irrf: Vec<IrrfBracket>,
    pub dependent_deduction: Decimal,
    pub fgts_rate: Rate,
    pub monthly_hours: Decimal,
    pub overtime_multiplier: Decimal,
}

impl Default for PayrollTables {
    fn default() -> Self {
        Self::brazil_2024()
    }
}

impl PayrollTables {
    pub fn brazil_2024() -> Self {
        let pct = Rate::from_percentage;
        Self {
            inss: vec![
                InssBracket { up_to: dec!(1412.00), rate: pct(dec!(7.5)) },
                InssBracket { up_to: dec!(2666.68), rate: pct(dec!(9)) },
                InssBracket { up_to: dec!(4000.03), rate: pct(dec!(12)) },
                InssBracket { up_to: dec!(7786.02), rate: pct(dec!(14)) },
            ],
            irrf: vec![
                IrrfBracket { up_to: Some(dec!(2259.20)), rate: Rate::zero(), deduction: Decimal::ZERO },
                IrrfBracket { up_to: Some(dec!(2826.65)), rate: pct(dec!(7.5)), deduction: dec!(169.44) },
                IrrfBracket { up_to: Some(dec!(3751.05)), rate: pct(dec!(15)), deduction: dec!(381.44) },
                IrrfBracket { up_to: Some(dec!(4664.68)), rate: pct(dec!(22.5)), deduction: dec!(662.77) },
                IrrfBracket { up_to: None, rate: pct(dec!(27.5)), deduction: dec!(896.00) },
            ],
            dependent_deduction: dec!(189.59),
            fgts_rate: pct(dec!(8)),
            monthly_hours: dec!(220),
            overtime_multiplier: dec!(1.5),
        }
    }

    /// Progressive INSS contribution, rounded to cents
    pub fn inss(&self, gross: Decimal) -> Decimal {
        let mut lower = Decimal::ZERO;
        let mut total = Decimal::ZERO;
        for bracket in &self.inss {
            if gross <= lower {
                break;
            }
            let slice = gross.min(bracket.up_to) - lower;
            total += slice * bracket.rate.as_decimal();
            lower = bracket.up_to;
        }
        total.round_dp(2)
    }

    /// IRRF on an already reduced base, never negative
    pub fn irrf(&self, base: Decimal) -> Decimal {
        let bracket = self
            .irrf
            .iter()
            .find(|b| b.up_to.map_or(true, |limit| base <= limit));
        match bracket {
            Some(b) => (base * b.rate.as_decimal() - b.deduction).max(Decimal::ZERO).round_dp(2),
            None => Decimal::ZERO,
        }
    }
}
