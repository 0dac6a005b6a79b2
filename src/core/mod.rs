mod document;
mod engine;
mod report;
mod types;
mod waterfall;

pub use document::{
    DEFAULT_CAPITAL_GAINS_RATE, DEFAULT_INCOME_TAX_RATE, DEFAULT_INFLATION, DocumentError,
    MAX_DOCUMENT_AMOUNT,
    HouseholdDocument, current_year, household_to_json, parse_household, sample_household,
};
pub use engine::{INSOLVENCY_THRESHOLD, PROJECTION_YEARS, STRESS_TEST_RETURNS, project};
pub use report::{GuardrailStatus, to_real_dollars};
pub use types::{
    Asset, CashFlow, Contributor, FixedIncomeStream, Household, HouseholdParameters,
    IncomeBreakdown, IncomeKind, OneTimeExpense, SUSTAINABLE_SENTINEL_AGE, SimulationResult,
    SimulationSummary, SolvencyHorizon, SpendingPhase, TaxBucket, TaxRates, WithdrawalDetails,
};
pub use waterfall::{Draw, EffectiveRates, WITHDRAWAL_ORDER, WaterfallOutcome, run_waterfall};
