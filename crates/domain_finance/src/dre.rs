//! DRE (Demonstração do Resultado do Exercício)
//!
//! Built from settled entries by competence date. Transfers and investment
//! movements never touch the result.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use core_kernel::{Currency, DateRange, Money};
use crate::entry::{DreLine, EntryCategory, FinancialEntry};
use crate::error::FinanceError;

/// Income statement for a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreReport {
    pub period: DateRange,
    pub gross_revenue: Money,
    pub deductions: Money,
    pub net_revenue: Money,
    pub cost_of_goods: Money,
    pub gross_profit: Money,
    pub operating_expenses: Money,
    pub operating_result: Money,
    pub financial_income: Money,
    pub financial_expense: Money,
    pub financial_result: Money,
    pub net_result: Money,
    /// Gross profit over net revenue, in percent
    pub gross_margin: Decimal,
    /// Net result over net revenue, in percent
    pub net_margin: Decimal,
    /// Operating expenses per category
    pub expenses_by_category: BTreeMap<EntryCategory, Money>,
}

impl DreReport {
    pub fn build(period: DateRange, entries: &[FinancialEntry]) -> Result<Self, FinanceError> {
        let currency = entries
            .first()
            .map(|e| e.amount.currency())
            .unwrap_or(Currency::BRL);
        let zero = Money::zero(currency);
        let mut lines: BTreeMap<DreLine, Money> = BTreeMap::new();
        let mut expenses_by_category: BTreeMap<EntryCategory, Money> = BTreeMap::new();

        for entry in entries
            .iter()
            .filter(|e| e.is_settled() && period.contains(e.competence_date))
        {
            let line = entry.category.dre_line();
            if line == DreLine::Excluded {
                continue;
            }
            // Revenue lines grow with income, cost lines with expenses
            let value = match line {
                DreLine::GrossRevenue | DreLine::FinancialIncome => entry.signed_amount(),
                _ => -entry.signed_amount(),
            };
            let slot = lines.entry(line).or_insert(zero);
            *slot = slot.checked_add(&value)?;
            if line == DreLine::OperatingExpenses {
                let slot = expenses_by_category.entry(entry.category).or_insert(zero);
                *slot = slot.checked_add(&value)?;
            }
        }

        let line = |l: DreLine| lines.get(&l).copied().unwrap_or(zero);
        let gross_revenue = line(DreLine::GrossRevenue);
        let deductions = line(DreLine::Deductions);
        let net_revenue = gross_revenue.checked_sub(&deductions)?;
        let cost_of_goods = line(DreLine::CostOfGoods);
        let gross_profit = net_revenue.checked_sub(&cost_of_goods)?;
        let operating_expenses = line(DreLine::OperatingExpenses);
        let operating_result = gross_profit.checked_sub(&operating_expenses)?;
        let financial_income = line(DreLine::FinancialIncome);
        let financial_expense = line(DreLine::FinancialExpense);
        let financial_result = financial_income.checked_sub(&financial_expense)?;
        let net_result = operating_result.checked_add(&financial_result)?;

        Ok(Self {
            period,
            gross_revenue,
            deductions,
            net_revenue,
            cost_of_goods,
            gross_profit,
            operating_expenses,
            operating_result,
            financial_income,
            financial_expense,
            financial_result,
            net_result,
            gross_margin: margin(&gross_profit, &net_revenue),
            net_margin: margin(&net_result, &net_revenue),
            expenses_by_category,
        })
    }
}

fn margin(part: &Money, whole: &Money) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part.amount() / whole.amount() * dec!(100)).round_dp(2)
}
