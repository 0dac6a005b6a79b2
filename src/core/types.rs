use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Age reported for a plan that never runs out of money.
pub const SUSTAINABLE_SENTINEL_AGE: u32 = 999;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TaxBucket {
    Cash,
    Taxable,
    PreTax,
    Roth,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum IncomeKind {
    SocialSecurity,
    Pension,
    Annuity,
    Rental,
    Consulting,
    Windfall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub current_age: u32,
    pub retirement_age: u32,
    #[serde(default)]
    pub life_expectancy: u32,
    pub salary: Decimal,
    /// Falls back to the household inflation rate when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_growth_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub bucket: TaxBucket,
    pub balance: Decimal,
    #[serde(default)]
    pub cost_basis: Decimal,
    pub annual_return: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedIncomeStream {
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: IncomeKind,
    pub monthly_amount: Decimal,
    pub start_age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_age: Option<u32>,
    #[serde(default)]
    pub taxable: bool,
    #[serde(default)]
    pub inflation_adjusted: bool,
}

impl FixedIncomeStream {
    pub fn is_active_at(&self, owner_age: u32) -> bool {
        owner_age >= self.start_age && self.end_age.is_none_or(|end| owner_age < end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingPhase {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start_age: u32,
    pub end_age: u32,
    pub essential: Decimal,
    pub discretionary: Decimal,
}

impl SpendingPhase {
    pub fn contains(&self, age: u32) -> bool {
        age >= self.start_age && age < self.end_age
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeExpense {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub year: i32,
    pub amount: Decimal,
    pub is_essential: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRates {
    pub income: Decimal,
    pub capital_gains: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdParameters {
    pub inflation: Decimal,
    pub start_year: i32,
    pub tax_rates: TaxRates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Household {
    pub contributors: Vec<Contributor>,
    pub assets: Vec<Asset>,
    pub fixed_income: Vec<FixedIncomeStream>,
    pub spending: Vec<SpendingPhase>,
    pub one_time_expenses: Vec<OneTimeExpense>,
    pub parameters: HouseholdParameters,
}

impl Household {
    pub fn primary(&self) -> Option<&Contributor> {
        self.contributors.first()
    }

    pub fn total_assets(&self) -> Decimal {
        self.assets
            .iter()
            .fold(Decimal::ZERO, |total, a| total.saturating_add(a.balance))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeBreakdown {
    pub salary1: Decimal,
    pub salary2: Decimal,
    pub fixed_income: Decimal,
}

impl IncomeBreakdown {
    pub fn total(self) -> Decimal {
        self.salary1
            .saturating_add(self.salary2)
            .saturating_add(self.fixed_income)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDetails {
    pub cash: Decimal,
    pub taxable: Decimal,
    pub pre_tax: Decimal,
    pub roth: Decimal,
}

impl WithdrawalDetails {
    pub fn total(self) -> Decimal {
        self.cash
            .saturating_add(self.taxable)
            .saturating_add(self.pre_tax)
            .saturating_add(self.roth)
    }

    pub fn get(&self, bucket: TaxBucket) -> Decimal {
        match bucket {
            TaxBucket::Cash => self.cash,
            TaxBucket::Taxable => self.taxable,
            TaxBucket::PreTax => self.pre_tax,
            TaxBucket::Roth => self.roth,
        }
    }

    pub fn add(&mut self, bucket: TaxBucket, amount: Decimal) {
        let slot = match bucket {
            TaxBucket::Cash => &mut self.cash,
            TaxBucket::Taxable => &mut self.taxable,
            TaxBucket::PreTax => &mut self.pre_tax,
            TaxBucket::Roth => &mut self.roth,
        };
        *slot = slot.saturating_add(amount);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlow {
    pub income: IncomeBreakdown,
    pub essential_expenses: Decimal,
    pub discretionary_expenses: Decimal,
    pub expenses: Decimal,
    pub taxes_paid: Decimal,
    pub surplus: Decimal,
    pub shortfall: Decimal,
    pub withdrawal_details: WithdrawalDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub year: i32,
    pub ages: BTreeMap<String, u32>,
    pub total_portfolio_value: Decimal,
    pub cash_flow: CashFlow,
    pub ending_balances: Vec<Asset>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(into = "u32")]
pub enum SolvencyHorizon {
    Indefinite,
    ExhaustedAt(u32),
}

impl SolvencyHorizon {
    pub fn is_indefinite(self) -> bool {
        matches!(self, SolvencyHorizon::Indefinite)
    }

    /// Legacy integer form, `SUSTAINABLE_SENTINEL_AGE` when indefinite.
    pub fn as_age(self) -> u32 {
        match self {
            SolvencyHorizon::Indefinite => SUSTAINABLE_SENTINEL_AGE,
            SolvencyHorizon::ExhaustedAt(age) => age,
        }
    }

    pub fn is_solvent_through(self, age: u32) -> bool {
        match self {
            SolvencyHorizon::Indefinite => true,
            SolvencyHorizon::ExhaustedAt(exhausted) => exhausted >= age,
        }
    }
}

impl From<SolvencyHorizon> for u32 {
    fn from(value: SolvencyHorizon) -> Self {
        value.as_age()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub annual_results: Vec<SimulationResult>,
    #[serde(rename = "solventUntilAge")]
    pub solvency: SolvencyHorizon,
    pub initial_withdrawal_rate: Decimal,
}

impl SimulationSummary {
    pub fn empty() -> Self {
        Self {
            annual_results: Vec::new(),
            solvency: SolvencyHorizon::ExhaustedAt(0),
            initial_withdrawal_rate: Decimal::ZERO,
        }
    }
}
