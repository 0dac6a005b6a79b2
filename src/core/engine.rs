use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::types::{
    Asset, CashFlow, Contributor, Household, IncomeBreakdown, OneTimeExpense, SimulationResult,
    SimulationSummary, SolvencyHorizon, SpendingPhase, TaxBucket, WithdrawalDetails,
};
use super::waterfall::{EffectiveRates, WaterfallOutcome, run_waterfall};

pub const PROJECTION_YEARS: u32 = 51;

/// Portfolio value at or below which the household counts as exhausted.
pub const INSOLVENCY_THRESHOLD: Decimal = dec!(1.00);

pub const STRESS_TEST_RETURNS: [Decimal; 3] = [dec!(-0.37), dec!(0.26), dec!(0.15)];

const MONEY_DP: u32 = 2;
const RATE_DP: u32 = 6;

#[derive(Debug, Clone, Copy, Default)]
struct ExpenseBreakdown {
    essential: Decimal,
    discretionary: Decimal,
}

impl ExpenseBreakdown {
    fn total(self) -> Decimal {
        self.essential.saturating_add(self.discretionary)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FundingOutcome {
    waterfall: WaterfallOutcome,
    surplus: Decimal,
}

pub fn project(household: &Household, stress_test: bool) -> SimulationSummary {
    let Some(primary) = household.primary() else {
        log::debug!("household has no contributors; returning an empty projection");
        return SimulationSummary::empty();
    };

    let params = &household.parameters;
    let rates = EffectiveRates::from_tax_rates(&params.tax_rates);
    let mut assets = household.assets.clone();
    let initial_total_assets = household.total_assets();

    log::debug!(
        "projecting {} contributors, {} assets from {} (stress test: {stress_test})",
        household.contributors.len(),
        assets.len(),
        params.start_year
    );

    let mut solvency = SolvencyHorizon::Indefinite;
    let mut initial_net_needed = Decimal::ZERO;
    let mut annual_results = Vec::with_capacity(PROJECTION_YEARS as usize);

    for year_step in 0..PROJECTION_YEARS {
        let calendar_year = params.start_year + year_step as i32;
        let ages = contributor_ages(&household.contributors, year_step);
        let primary_age = primary.current_age + year_step;
        let inflation_factor = compound(params.inflation, year_step);

        let income = income_for_year(household, &ages, year_step, inflation_factor);
        let expenses = expenses_for_year(household, primary_age, calendar_year, inflation_factor);

        let net_needed = expenses.total() - income.total();
        if year_step == 0 {
            initial_net_needed = net_needed.max(Decimal::ZERO);
        }

        let funding = fund_year(&mut assets, net_needed, &rates);
        apply_growth(&mut assets, year_step, stress_test);

        let total_value = portfolio_value(&assets);
        if solvency.is_indefinite() && total_value <= INSOLVENCY_THRESHOLD {
            log::debug!("portfolio exhausted in {calendar_year} at primary age {primary_age}");
            solvency = SolvencyHorizon::ExhaustedAt(primary_age);
        }

        annual_results.push(record_year(
            household,
            calendar_year,
            &ages,
            total_value,
            income,
            expenses,
            &funding,
            &assets,
        ));
    }

    let initial_withdrawal_rate = if initial_total_assets > Decimal::ZERO {
        round_rate(
            initial_net_needed
                .checked_div(initial_total_assets)
                .unwrap_or(Decimal::MAX),
        )
    } else {
        Decimal::ZERO
    };

    SimulationSummary {
        annual_results,
        solvency,
        initial_withdrawal_rate,
    }
}

/// `(1 + rate)^years`, saturating at `Decimal::MAX`.
pub(crate) fn compound(rate: Decimal, years: u32) -> Decimal {
    let factor = Decimal::ONE.saturating_add(rate);
    let mut result = Decimal::ONE;
    for _ in 0..years {
        result = result.saturating_mul(factor);
    }
    result
}

fn portfolio_value(assets: &[Asset]) -> Decimal {
    assets
        .iter()
        .fold(Decimal::ZERO, |total, a| total.saturating_add(a.balance))
}

pub(crate) fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RATE_DP, RoundingStrategy::MidpointAwayFromZero)
}

fn contributor_ages(contributors: &[Contributor], year_step: u32) -> Vec<u32> {
    contributors
        .iter()
        .map(|c| c.current_age + year_step)
        .collect()
}

fn owner_age(household: &Household, ages: &[u32], owner_id: &str) -> u32 {
    match household.contributors.iter().position(|c| c.id == owner_id) {
        Some(idx) => ages[idx],
        None => {
            log::debug!("income owner {owner_id:?} matches no contributor; using primary age");
            ages[0]
        }
    }
}

fn salary_for_year(
    contributor: &Contributor,
    age: u32,
    year_step: u32,
    inflation: Decimal,
) -> Decimal {
    if age >= contributor.retirement_age {
        return Decimal::ZERO;
    }
    let growth = contributor.salary_growth_rate.unwrap_or(inflation);
    contributor.salary.saturating_mul(compound(growth, year_step))
}

fn income_for_year(
    household: &Household,
    ages: &[u32],
    year_step: u32,
    inflation_factor: Decimal,
) -> IncomeBreakdown {
    let inflation = household.parameters.inflation;
    let mut salaries = household
        .contributors
        .iter()
        .zip(ages)
        .take(2)
        .map(|(c, &age)| salary_for_year(c, age, year_step, inflation));

    let salary1 = salaries.next().unwrap_or(Decimal::ZERO);
    let salary2 = salaries.next().unwrap_or(Decimal::ZERO);

    let fixed_income: Decimal = household
        .fixed_income
        .iter()
        .filter(|stream| stream.is_active_at(owner_age(household, ages, &stream.owner_id)))
        .map(|stream| {
            let annual = stream.monthly_amount.saturating_mul(dec!(12));
            if stream.inflation_adjusted {
                annual.saturating_mul(inflation_factor)
            } else {
                annual
            }
        })
        .fold(Decimal::ZERO, Decimal::saturating_add);

    IncomeBreakdown {
        salary1,
        salary2,
        fixed_income,
    }
}

/// Phase containing `age`, or the latest-ending phase once `age` is past every phase.
pub(crate) fn active_spending_phase(phases: &[SpendingPhase], age: u32) -> Option<&SpendingPhase> {
    let mut ordered: Vec<&SpendingPhase> = phases.iter().collect();
    ordered.sort_by_key(|p| (p.start_age, p.end_age));

    if let Some(phase) = ordered.iter().find(|p| p.contains(age)) {
        return Some(*phase);
    }

    let latest = ordered.iter().copied().max_by_key(|p| p.end_age)?;
    (age >= latest.end_age).then_some(latest)
}

fn expenses_for_year(
    household: &Household,
    primary_age: u32,
    calendar_year: i32,
    inflation_factor: Decimal,
) -> ExpenseBreakdown {
    let mut expenses = ExpenseBreakdown::default();

    if let Some(phase) = active_spending_phase(&household.spending, primary_age) {
        expenses.essential = phase.essential.saturating_mul(inflation_factor);
        expenses.discretionary = phase.discretionary.saturating_mul(inflation_factor);
    }

    for expense in one_time_expenses_in(&household.one_time_expenses, calendar_year) {
        let amount = expense.amount.saturating_mul(inflation_factor);
        if expense.is_essential {
            expenses.essential = expenses.essential.saturating_add(amount);
        } else {
            expenses.discretionary = expenses.discretionary.saturating_add(amount);
        }
    }

    expenses
}

fn one_time_expenses_in(
    expenses: &[OneTimeExpense],
    calendar_year: i32,
) -> impl Iterator<Item = &OneTimeExpense> {
    expenses.iter().filter(move |e| e.year == calendar_year)
}

fn fund_year(assets: &mut [Asset], net_needed: Decimal, rates: &EffectiveRates) -> FundingOutcome {
    if net_needed > Decimal::ZERO {
        return FundingOutcome {
            waterfall: run_waterfall(assets, net_needed, rates),
            surplus: Decimal::ZERO,
        };
    }

    let surplus = net_needed.abs();
    reinvest_surplus(assets, surplus);
    FundingOutcome {
        waterfall: WaterfallOutcome::default(),
        surplus,
    }
}

fn reinvest_surplus(assets: &mut [Asset], surplus: Decimal) {
    let target = match assets.iter().position(|a| a.bucket == TaxBucket::Taxable) {
        Some(idx) => Some(idx),
        None if !assets.is_empty() => Some(0),
        None => None,
    };
    if let Some(idx) = target {
        assets[idx].balance = assets[idx].balance.saturating_add(surplus);
    }
}

fn growth_rate(asset: &Asset, year_step: u32, stress_test: bool) -> Decimal {
    if stress_test {
        if let Some(rate) = STRESS_TEST_RETURNS.get(year_step as usize) {
            return *rate;
        }
    }
    asset.annual_return
}

fn apply_growth(assets: &mut [Asset], year_step: u32, stress_test: bool) {
    for asset in assets.iter_mut().filter(|a| a.balance > Decimal::ZERO) {
        let rate = growth_rate(asset, year_step, stress_test);
        let growth = asset.balance.saturating_mul(rate);
        asset.balance = asset.balance.saturating_add(growth).max(Decimal::ZERO);
    }
}

#[allow(clippy::too_many_arguments)]
fn record_year(
    household: &Household,
    calendar_year: i32,
    ages: &[u32],
    total_value: Decimal,
    income: IncomeBreakdown,
    expenses: ExpenseBreakdown,
    funding: &FundingOutcome,
    assets: &[Asset],
) -> SimulationResult {
    let ages = household
        .contributors
        .iter()
        .zip(ages)
        .map(|(c, &age)| (c.id.clone(), age))
        .collect::<BTreeMap<_, _>>();

    let withdrawals = funding.waterfall.withdrawals;
    let cash_flow = CashFlow {
        income: IncomeBreakdown {
            salary1: round_money(income.salary1),
            salary2: round_money(income.salary2),
            fixed_income: round_money(income.fixed_income),
        },
        essential_expenses: round_money(expenses.essential),
        discretionary_expenses: round_money(expenses.discretionary),
        expenses: round_money(expenses.total()),
        taxes_paid: round_money(funding.waterfall.taxes_paid),
        surplus: round_money(funding.surplus),
        shortfall: round_money(funding.waterfall.unmet_need),
        withdrawal_details: WithdrawalDetails {
            cash: round_money(withdrawals.cash),
            taxable: round_money(withdrawals.taxable),
            pre_tax: round_money(withdrawals.pre_tax),
            roth: round_money(withdrawals.roth),
        },
    };

    let ending_balances = assets
        .iter()
        .map(|a| Asset {
            balance: round_money(a.balance),
            ..a.clone()
        })
        .collect();

    SimulationResult {
        year: calendar_year,
        ages,
        total_portfolio_value: round_money(total_value),
        cash_flow,
        ending_balances,
    }
}
