use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::engine::{compound, round_money};
use super::types::{CashFlow, SimulationResult, SimulationSummary};

pub const SOLVENT_THROUGH_AGE: u32 = 90;
pub const DANGER_WITHDRAWAL_RATE: Decimal = dec!(0.055);
pub const CAUTION_WITHDRAWAL_RATE: Decimal = dec!(0.04);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum GuardrailStatus {
    Safe,
    Caution,
    DangerZone,
    CriticalFailure,
}

impl GuardrailStatus {
    pub fn classify(summary: &SimulationSummary) -> Self {
        if !summary.solvency.is_solvent_through(SOLVENT_THROUGH_AGE) {
            return GuardrailStatus::CriticalFailure;
        }

        let rate = summary.initial_withdrawal_rate;
        if rate > DANGER_WITHDRAWAL_RATE {
            GuardrailStatus::DangerZone
        } else if rate > CAUTION_WITHDRAWAL_RATE {
            GuardrailStatus::Caution
        } else {
            GuardrailStatus::Safe
        }
    }
}

/// Restates flows and balances in start-year dollars. Cost basis stays nominal.
pub fn to_real_dollars(summary: &SimulationSummary, inflation: Decimal) -> SimulationSummary {
    let annual_results = summary
        .annual_results
        .iter()
        .enumerate()
        .map(|(year_step, result)| {
            let deflator = compound(inflation, year_step as u32);
            if deflator <= Decimal::ZERO {
                return result.clone();
            }
            deflate_year(result, deflator)
        })
        .collect();

    SimulationSummary {
        annual_results,
        solvency: summary.solvency,
        initial_withdrawal_rate: summary.initial_withdrawal_rate,
    }
}

fn deflate_year(result: &SimulationResult, deflator: Decimal) -> SimulationResult {
    let real = |value: Decimal| round_money(value.checked_div(deflator).unwrap_or(Decimal::MAX));
    let flow = &result.cash_flow;

    let mut cash_flow = CashFlow {
        essential_expenses: real(flow.essential_expenses),
        discretionary_expenses: real(flow.discretionary_expenses),
        expenses: real(flow.expenses),
        taxes_paid: real(flow.taxes_paid),
        surplus: real(flow.surplus),
        shortfall: real(flow.shortfall),
        ..*flow
    };
    cash_flow.income.salary1 = real(flow.income.salary1);
    cash_flow.income.salary2 = real(flow.income.salary2);
    cash_flow.income.fixed_income = real(flow.income.fixed_income);
    cash_flow.withdrawal_details.cash = real(flow.withdrawal_details.cash);
    cash_flow.withdrawal_details.taxable = real(flow.withdrawal_details.taxable);
    cash_flow.withdrawal_details.pre_tax = real(flow.withdrawal_details.pre_tax);
    cash_flow.withdrawal_details.roth = real(flow.withdrawal_details.roth);

    let ending_balances = result
        .ending_balances
        .iter()
        .cloned()
        .map(|mut asset| {
            asset.balance = real(asset.balance);
            asset
        })
        .collect();

    SimulationResult {
        year: result.year,
        ages: result.ages.clone(),
        total_portfolio_value: real(result.total_portfolio_value),
        cash_flow,
        ending_balances,
    }
}
