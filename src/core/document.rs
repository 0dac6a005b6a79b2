use chrono::Datelike;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use thiserror::Error;

use super::types::{
    Asset, Contributor, FixedIncomeStream, Household, HouseholdParameters, IncomeKind,
    OneTimeExpense, SpendingPhase, TaxBucket, TaxRates,
};

pub const DEFAULT_INFLATION: Decimal = dec!(0.03);
pub const DEFAULT_INCOME_TAX_RATE: Decimal = dec!(0.25);
pub const DEFAULT_CAPITAL_GAINS_RATE: Decimal = dec!(0.15);

/// Largest balance or annual amount a document may carry.
pub const MAX_DOCUMENT_AMOUNT: Decimal = dec!(1_000_000_000_000);

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid household JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("household document is missing the `{section}` section")]
    MissingSection { section: &'static str },
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: &'static str },
    #[error("spending phase `{id}` has neither `essential` nor `annualAmount`")]
    InvalidSpendingPhase { id: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HouseholdDocument {
    contributors: Option<Vec<Contributor>>,
    assets: Option<Vec<Asset>>,
    fixed_income: Option<Vec<FixedIncomeStream>>,
    spending: Option<Vec<SpendingPhaseDocument>>,
    one_time_expenses: Option<Vec<OneTimeExpense>>,
    parameters: Option<ParametersDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpendingPhaseDocument {
    id: String,
    #[serde(default)]
    name: String,
    start_age: u32,
    end_age: u32,
    essential: Option<Decimal>,
    discretionary: Option<Decimal>,
    /// Single-amount form written before the essential/discretionary split.
    annual_amount: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ParametersDocument {
    inflation: Option<Decimal>,
    start_year: Option<i32>,
    tax_rates: Option<TaxRatesDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TaxRatesDocument {
    income: Option<Decimal>,
    capital_gains: Option<Decimal>,
}

impl HouseholdDocument {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_household(self, current_year: i32) -> Result<Household, DocumentError> {
        let contributors = self
            .contributors
            .ok_or(DocumentError::MissingSection { section: "contributors" })?;
        let assets = self
            .assets
            .ok_or(DocumentError::MissingSection { section: "assets" })?;
        let parameters = self
            .parameters
            .ok_or(DocumentError::MissingSection { section: "parameters" })?;

        for contributor in &contributors {
            validate_amount(format!("contributors[{}].salary", contributor.id), contributor.salary)?;
            if let Some(rate) = contributor.salary_growth_rate {
                validate_growth_rate(format!("contributors[{}].salaryGrowthRate", contributor.id), rate)?;
            }
        }
        for asset in &assets {
            if asset.balance < Decimal::ZERO {
                return Err(DocumentError::InvalidValue {
                    field: format!("assets[{}].balance", asset.id),
                    reason: "balance must not be negative",
                });
            }
            validate_amount(format!("assets[{}].balance", asset.id), asset.balance)?;
            validate_growth_rate(format!("assets[{}].annualReturn", asset.id), asset.annual_return)?;
        }

        let fixed_income = self.fixed_income.unwrap_or_default();
        for stream in &fixed_income {
            validate_amount(format!("fixedIncome[{}].monthlyAmount", stream.id), stream.monthly_amount)?;
        }

        let spending = self
            .spending
            .unwrap_or_default()
            .into_iter()
            .map(SpendingPhaseDocument::into_phase)
            .collect::<Result<Vec<_>, _>>()?;
        for phase in &spending {
            validate_amount(format!("spending[{}].essential", phase.id), phase.essential)?;
            validate_amount(format!("spending[{}].discretionary", phase.id), phase.discretionary)?;
        }

        let one_time_expenses = self.one_time_expenses.unwrap_or_default();
        for expense in &one_time_expenses {
            validate_amount(format!("oneTimeExpenses[{}].amount", expense.id), expense.amount)?;
        }

        Ok(Household {
            contributors,
            assets,
            fixed_income,
            spending,
            one_time_expenses,
            parameters: parameters.resolve(current_year)?,
        })
    }
}

impl SpendingPhaseDocument {
    fn into_phase(self) -> Result<SpendingPhase, DocumentError> {
        let (essential, discretionary) = match (self.essential, self.annual_amount) {
            (Some(essential), _) => (essential, self.discretionary.unwrap_or_default()),
            (None, Some(amount)) => {
                log::warn!(
                    "spending phase `{}` uses legacy annualAmount; treating it as essential",
                    self.id
                );
                (amount, Decimal::ZERO)
            }
            (None, None) => return Err(DocumentError::InvalidSpendingPhase { id: self.id }),
        };

        Ok(SpendingPhase {
            id: self.id,
            name: self.name,
            start_age: self.start_age,
            end_age: self.end_age,
            essential,
            discretionary,
        })
    }
}

impl ParametersDocument {
    fn resolve(self, current_year: i32) -> Result<HouseholdParameters, DocumentError> {
        let tax_rates = self.tax_rates.unwrap_or_default();
        let income = validate_tax_rate(
            "parameters.taxRates.income",
            tax_rates.income.unwrap_or(DEFAULT_INCOME_TAX_RATE),
        )?;
        let capital_gains = validate_tax_rate(
            "parameters.taxRates.capitalGains",
            tax_rates.capital_gains.unwrap_or(DEFAULT_CAPITAL_GAINS_RATE),
        )?;

        let inflation = self.inflation.unwrap_or(DEFAULT_INFLATION);
        if inflation <= -Decimal::ONE || inflation > Decimal::ONE {
            return Err(DocumentError::InvalidValue {
                field: "parameters.inflation".to_string(),
                reason: "inflation must be in (-1, 1]",
            });
        }

        Ok(HouseholdParameters {
            inflation,
            start_year: self.start_year.unwrap_or(current_year),
            tax_rates: TaxRates {
                income,
                capital_gains,
            },
        })
    }
}

fn validate_tax_rate(field: &str, rate: Decimal) -> Result<Decimal, DocumentError> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(DocumentError::InvalidValue {
            field: field.to_string(),
            reason: "tax rate must be in [0, 1)",
        });
    }
    Ok(rate)
}

fn validate_growth_rate(field: String, rate: Decimal) -> Result<(), DocumentError> {
    if rate < -Decimal::ONE || rate > Decimal::ONE {
        return Err(DocumentError::InvalidValue {
            field,
            reason: "rate must be in [-1, 1]",
        });
    }
    Ok(())
}

fn validate_amount(field: String, amount: Decimal) -> Result<(), DocumentError> {
    if amount < Decimal::ZERO || amount > MAX_DOCUMENT_AMOUNT {
        return Err(DocumentError::InvalidValue {
            field,
            reason: "amount must be between 0 and 1e12",
        });
    }
    Ok(())
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

pub fn parse_household(json: &str) -> Result<Household, DocumentError> {
    HouseholdDocument::from_json(json)?.into_household(current_year())
}

pub fn household_to_json(household: &Household) -> Result<String, DocumentError> {
    Ok(serde_json::to_string_pretty(household)?)
}

pub fn sample_household(start_year: i32) -> Household {
    Household {
        contributors: vec![
            contributor("c1", "John", 50, 90, dec!(150000)),
            contributor("c2", "Jane", 48, 95, dec!(120000)),
        ],
        assets: vec![
            asset("a1", "c1", "John 401k", TaxBucket::PreTax, dec!(500000), Decimal::ZERO),
            asset("a2", "c2", "Jane 401k", TaxBucket::PreTax, dec!(400000), Decimal::ZERO),
            asset("a3", "c1", "Joint Brokerage", TaxBucket::Taxable, dec!(400000), dec!(300000)),
            asset("a4", "c2", "Jane Roth IRA", TaxBucket::Roth, dec!(200000), dec!(150000)),
        ],
        fixed_income: vec![
            income("fi1", "c1", "John Pension", IncomeKind::Pension, dec!(4000), 65, None, false),
            income("fi2", "c1", "John Social Security", IncomeKind::SocialSecurity, dec!(3000), 67, None, true),
            income("fi3", "c2", "Jane Social Security", IncomeKind::SocialSecurity, dec!(2500), 67, None, true),
            income("fi4", "c1", "Rental Property", IncomeKind::Rental, dec!(1000), 50, Some(80), true),
        ],
        spending: vec![
            phase("sp1", "Pre-Retirement", 50, 65, dec!(60000), dec!(40000)),
            phase("sp2", "Active Retirement", 65, 75, dec!(50000), dec!(70000)),
            phase("sp3", "Late Retirement", 75, 95, dec!(50000), dec!(40000)),
        ],
        one_time_expenses: vec![OneTimeExpense {
            id: "ote1".to_string(),
            name: "Daughter Wedding".to_string(),
            year: start_year + 5,
            amount: dec!(40000),
            is_essential: false,
        }],
        parameters: HouseholdParameters {
            inflation: dec!(0.03),
            start_year,
            tax_rates: TaxRates {
                income: dec!(0.24),
                capital_gains: dec!(0.15),
            },
        },
    }
}

fn contributor(id: &str, name: &str, age: u32, life_expectancy: u32, salary: Decimal) -> Contributor {
    Contributor {
        id: id.to_string(),
        name: name.to_string(),
        current_age: age,
        retirement_age: 65,
        life_expectancy,
        salary,
        salary_growth_rate: Some(dec!(0.03)),
    }
}

fn asset(
    id: &str,
    owner_id: &str,
    name: &str,
    bucket: TaxBucket,
    balance: Decimal,
    cost_basis: Decimal,
) -> Asset {
    Asset {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        name: name.to_string(),
        bucket,
        balance,
        cost_basis,
        annual_return: dec!(0.07),
    }
}

#[allow(clippy::too_many_arguments)]
fn income(
    id: &str,
    owner_id: &str,
    name: &str,
    kind: IncomeKind,
    monthly_amount: Decimal,
    start_age: u32,
    end_age: Option<u32>,
    inflation_adjusted: bool,
) -> FixedIncomeStream {
    FixedIncomeStream {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        name: name.to_string(),
        kind,
        monthly_amount,
        start_age,
        end_age,
        taxable: true,
        inflation_adjusted,
    }
}

fn phase(
    id: &str,
    name: &str,
    start_age: u32,
    end_age: u32,
    essential: Decimal,
    discretionary: Decimal,
) -> SpendingPhase {
    SpendingPhase {
        id: id.to_string(),
        name: name.to_string(),
        start_age,
        end_age,
        essential,
        discretionary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(json: &str) -> Result<Household, DocumentError> {
        HouseholdDocument::from_json(json)?.into_household(2030)
    }

    const MINIMAL: &str = r#"{
        "contributors": [
            {"id": "c1", "currentAge": 60, "retirementAge": 65, "salary": 80000}
        ],
        "assets": [
            {"id": "a1", "type": "Taxable", "balance": 250000, "annualReturn": 0.05}
        ],
        "parameters": {}
    }"#;

    #[test]
    fn minimal_document_fills_defaults() {
        let household = load(MINIMAL).expect("minimal document should load");

        assert_eq!(household.parameters.inflation, DEFAULT_INFLATION);
        assert_eq!(household.parameters.start_year, 2030);
        assert_eq!(household.parameters.tax_rates.income, DEFAULT_INCOME_TAX_RATE);
        assert_eq!(
            household.parameters.tax_rates.capital_gains,
            DEFAULT_CAPITAL_GAINS_RATE
        );
        assert!(household.fixed_income.is_empty());
        assert!(household.spending.is_empty());
        assert!(household.one_time_expenses.is_empty());

        let contributor = &household.contributors[0];
        assert_eq!(contributor.salary_growth_rate, None);
        assert_eq!(contributor.name, "");
        assert_eq!(household.assets[0].cost_basis, Decimal::ZERO);
        assert_eq!(household.assets[0].bucket, TaxBucket::Taxable);
    }

    #[test]
    fn explicit_parameters_win_over_defaults() {
        let json = r#"{
            "contributors": [],
            "assets": [],
            "parameters": {"inflation": 0.02, "startYear": 2026, "taxRates": {"income": 0.3}}
        }"#;
        let household = load(json).expect("document should load");

        assert_eq!(household.parameters.inflation, dec!(0.02));
        assert_eq!(household.parameters.start_year, 2026);
        assert_eq!(household.parameters.tax_rates.income, dec!(0.3));
        assert_eq!(
            household.parameters.tax_rates.capital_gains,
            DEFAULT_CAPITAL_GAINS_RATE
        );
    }

    #[test]
    fn legacy_annual_amount_becomes_essential() {
        let json = r#"{
            "contributors": [],
            "assets": [],
            "spending": [
                {"id": "old", "startAge": 65, "endAge": 90, "annualAmount": 45000},
                {"id": "new", "startAge": 90, "endAge": 100, "essential": 30000}
            ],
            "parameters": {}
        }"#;
        let household = load(json).expect("legacy phase should migrate");

        assert_eq!(household.spending[0].essential, dec!(45000));
        assert_eq!(household.spending[0].discretionary, Decimal::ZERO);
        assert_eq!(household.spending[1].essential, dec!(30000));
        assert_eq!(household.spending[1].discretionary, Decimal::ZERO);
    }

    #[test]
    fn phase_without_any_amount_is_rejected() {
        let json = r#"{
            "contributors": [],
            "assets": [],
            "spending": [{"id": "broken", "startAge": 65, "endAge": 90}],
            "parameters": {}
        }"#;
        let err = load(json).expect_err("phase without amount must fail");
        assert!(matches!(err, DocumentError::InvalidSpendingPhase { ref id } if id == "broken"));
    }

    #[test]
    fn missing_required_sections_are_reported() {
        let err = load(r#"{"assets": [], "parameters": {}}"#).expect_err("no contributors");
        assert!(matches!(
            err,
            DocumentError::MissingSection { section: "contributors" }
        ));

        let err = load(r#"{"contributors": [], "parameters": {}}"#).expect_err("no assets");
        assert!(matches!(err, DocumentError::MissingSection { section: "assets" }));

        let err = load(r#"{"contributors": [], "assets": []}"#).expect_err("no parameters");
        assert!(matches!(
            err,
            DocumentError::MissingSection { section: "parameters" }
        ));
    }

    #[test]
    fn negative_balance_and_bad_tax_rates_are_rejected() {
        let json = r#"{
            "contributors": [],
            "assets": [{"id": "a1", "type": "Cash", "balance": -5, "annualReturn": 0}],
            "parameters": {}
        }"#;
        let err = load(json).expect_err("negative balance must fail");
        assert!(err.to_string().contains("assets[a1].balance"));

        let json = r#"{
            "contributors": [],
            "assets": [],
            "parameters": {"taxRates": {"capitalGains": 1.0}}
        }"#;
        let err = load(json).expect_err("full capital gains rate must fail");
        assert!(err.to_string().contains("capitalGains"));
    }

    #[test]
    fn out_of_range_rates_and_amounts_are_rejected() {
        let cases = [
            (
                r#"{"id": "a1", "type": "Roth", "balance": 1000000, "annualReturn": 4}"#,
                r#"{"id": "c1", "currentAge": 30, "retirementAge": 65, "salary": 0}"#,
                "{}",
                "assets[a1].annualReturn",
            ),
            (
                r#"{"id": "a1", "type": "Roth", "balance": 1e13, "annualReturn": 0.05}"#,
                r#"{"id": "c1", "currentAge": 30, "retirementAge": 65, "salary": 0}"#,
                "{}",
                "assets[a1].balance",
            ),
            (
                r#"{"id": "a1", "type": "Cash", "balance": 10, "annualReturn": 0}"#,
                r#"{"id": "c1", "currentAge": 30, "retirementAge": 65, "salary": 1,
                    "salaryGrowthRate": 3}"#,
                "{}",
                "contributors[c1].salaryGrowthRate",
            ),
            (
                r#"{"id": "a1", "type": "Cash", "balance": 10, "annualReturn": 0}"#,
                r#"{"id": "c1", "currentAge": 30, "retirementAge": 65, "salary": 1}"#,
                r#"{"inflation": -1}"#,
                "parameters.inflation",
            ),
            (
                r#"{"id": "a1", "type": "Cash", "balance": 10, "annualReturn": 0}"#,
                r#"{"id": "c1", "currentAge": 30, "retirementAge": 65, "salary": 1}"#,
                r#"{"inflation": 2.5}"#,
                "parameters.inflation",
            ),
        ];

        for (asset, contributor, parameters, field) in cases {
            let json = format!(
                r#"{{"contributors": [{contributor}], "assets": [{asset}], "parameters": {parameters}}}"#
            );
            let err = load(&json).expect_err("out-of-range document must fail");
            assert!(
                matches!(err, DocumentError::InvalidValue { field: ref f, .. } if f == field),
                "expected {field}, got {err}"
            );
        }
    }

    #[test]
    fn negative_spending_amount_is_rejected() {
        let json = r#"{
            "contributors": [],
            "assets": [],
            "spending": [{"id": "sp1", "startAge": 65, "endAge": 90, "essential": -100}],
            "parameters": {}
        }"#;
        let err = load(json).expect_err("negative spending must fail");
        assert!(err.to_string().contains("spending[sp1].essential"));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = load("{not json").expect_err("malformed input must fail");
        assert!(matches!(err, DocumentError::Json(_)));
    }

    #[test]
    fn exported_sample_reimports_unchanged() {
        let sample = sample_household(2025);
        let json = household_to_json(&sample).expect("sample should serialize");

        assert!(json.contains("\"oneTimeExpenses\""));
        assert!(json.contains("\"salaryGrowthRate\""));
        assert!(json.contains("\"type\": \"PreTax\""));

        let reloaded = load(&json).expect("exported JSON should reload");
        assert_eq!(reloaded, sample);
    }

    #[test]
    fn sample_household_matches_starting_scenario() {
        let sample = sample_household(2025);

        assert_eq!(sample.contributors.len(), 2);
        assert_eq!(sample.total_assets(), dec!(1500000));
        assert_eq!(sample.one_time_expenses[0].year, 2030);
        assert_eq!(sample.fixed_income[3].end_age, Some(80));
        assert_eq!(sample.parameters.tax_rates.income, dec!(0.24));
    }
}
