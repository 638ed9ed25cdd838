//! Month-by-month simulation

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{Currency, Money, Rate, SimulationId};
use crate::error::InvestmentError;
use crate::product::InvestmentProduct;
use crate::tax::regressive_tax_rate;
use crate::monthly_rate;

/// How the yield is quoted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateSpec {
    /// Fixed annual rate ("prefixado")
    Annual { rate: Rate },
    /// Percentage of the CDI, e.g. 110% of a 10.65% CDI
    CdiPercentage { percentage: Decimal, cdi_annual: Rate },
}

/// Highest annual rate accepted, 1000% a year
pub const MAX_ANNUAL_RATE: Decimal = dec!(10);

impl RateSpec {
    /// Annual rate as a fraction
    pub fn annual(&self) -> Result<Decimal, InvestmentError> {
        match self {
            RateSpec::Annual { rate } => Ok(rate.as_decimal()),
            RateSpec::CdiPercentage { percentage, cdi_annual } => cdi_annual
                .as_decimal()
                .checked_mul(*percentage)
                .and_then(|v| v.checked_div(dec!(100)))
                .ok_or_else(|| InvestmentError::InvalidInput(format!("{percentage}% of the CDI is out of range"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationInput {
    pub label: String,
    pub product: InvestmentProduct,
    pub initial: Money,
    pub monthly_contribution: Money,
    pub rate: RateSpec,
    pub months: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRow {
    pub month: u32,
    pub contribution: Money,
    pub interest: Money,
    pub balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub id: SimulationId,
    pub input: SimulationInput,
    pub monthly_rate: Decimal,
    pub schedule: Vec<MonthRow>,
    pub total_contributed: Money,
    pub gross_balance: Money,
    pub gross_interest: Money,
    pub tax_rate: Rate,
    pub income_tax: Money,
    pub net_balance: Money,
}

/// Runs a simulation
///
/// Interest accrues on the opening balance of each month, then that month's
/// contribution is added. Tax applies to all interest on redemption, using
/// the holding period of the initial deposit (months × 30 days).
pub fn simulate(input: &SimulationInput) -> Result<Simulation, InvestmentError> {
    if input.months == 0 || input.months > 600 {
        return Err(InvestmentError::InvalidInput(format!(
            "months must be between 1 and 600, got {}",
            input.months
        )));
    }
    if input.initial.is_negative() || input.monthly_contribution.is_negative() {
        return Err(InvestmentError::InvalidInput("amounts cannot be negative".to_string()));
    }
    if input.initial.currency() != input.monthly_contribution.currency() {
        return Err(InvestmentError::InvalidInput("mixed currencies".to_string()));
    }
    let annual = input.rate.annual()?;
    if annual <= dec!(-1) || annual > MAX_ANNUAL_RATE {
        return Err(InvestmentError::InvalidInput(format!(
            "annual rate {annual} must be above -1 and at most {MAX_ANNUAL_RATE}"
        )));
    }

    let currency = input.initial.currency();
    let rate = monthly_rate(annual);
    let contribution = input.monthly_contribution.amount();
    let mut balance = input.initial.amount();
    let mut contributed = balance;
    let mut interest_total = Decimal::ZERO;
    let mut schedule = Vec::with_capacity(input.months as usize);

    for month in 1..=input.months {
        let interest = checked(balance.checked_mul(rate), month)?;
        balance = checked(
            balance.checked_add(interest).and_then(|b| b.checked_add(contribution)),
            month,
        )?;
        contributed = checked(contributed.checked_add(contribution), month)?;
        interest_total = checked(interest_total.checked_add(interest), month)?;
        schedule.push(MonthRow {
            month,
            contribution: money(contribution, currency),
            interest: money(interest, currency),
            balance: money(balance, currency),
        });
    }

    let tax_rate = if input.product.is_tax_exempt() {
        Rate::zero()
    } else {
        regressive_tax_rate(input.months.saturating_mul(30))
    };
    let gross_interest = money(interest_total, currency);
    let income_tax = tax_rate.apply(&gross_interest).round_to_currency();
    let gross_balance = money(balance, currency);
    let net_balance = gross_balance
        .checked_sub(&income_tax)
        .map_err(|e| InvestmentError::Calculation(e.to_string()))?;

    debug!(label = %input.label, months = input.months, net = %net_balance, "simulation finished");
    Ok(Simulation {
        id: SimulationId::new(),
        input: input.clone(),
        monthly_rate: rate,
        schedule,
        total_contributed: money(contributed, currency),
        gross_balance,
        gross_interest,
        tax_rate,
        income_tax,
        net_balance,
    })
}

/// Simulates every input and sorts by net balance, best first
pub fn compare(inputs: &[SimulationInput]) -> Result<Vec<Simulation>, InvestmentError> {
    let mut simulations = inputs.iter().map(simulate).collect::<Result<Vec<_>, _>>()?;
    simulations.sort_by(|a, b| b.net_balance.amount().cmp(&a.net_balance.amount()));
    Ok(simulations)
}

fn checked(value: Option<Decimal>, month: u32) -> Result<Decimal, InvestmentError> {
    value.ok_or_else(|| InvestmentError::Calculation(format!("balance overflows in month {month}")))
}

fn money(value: Decimal, currency: Currency) -> Money {
    Money::new(value, currency).round_to_currency()
}
