use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{Asset, TaxBucket, TaxRates, WithdrawalDetails};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Draw {
    pub gross: Decimal,
    pub cash: Decimal,
    pub tax: Decimal,
    pub remaining_balance: Decimal,
}

impl Draw {
    fn nothing(balance: Decimal) -> Self {
        Self {
            gross: Decimal::ZERO,
            cash: Decimal::ZERO,
            tax: Decimal::ZERO,
            remaining_balance: balance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveRates {
    pub taxable: Decimal,
    pub pre_tax: Decimal,
}

impl EffectiveRates {
    pub fn from_tax_rates(rates: &TaxRates) -> Self {
        // Only part of a taxable sale is gain, so half the capital-gains rate applies.
        Self {
            taxable: clamp_rate(rates.capital_gains * dec!(0.5)),
            pre_tax: clamp_rate(rates.income),
        }
    }
}

fn clamp_rate(rate: Decimal) -> Decimal {
    rate.clamp(Decimal::ZERO, Decimal::ONE)
}

type BucketHandler = fn(Decimal, Decimal, &EffectiveRates) -> Draw;

pub const WITHDRAWAL_ORDER: [(TaxBucket, BucketHandler); 4] = [
    (TaxBucket::Cash, draw_cash),
    (TaxBucket::Taxable, draw_taxable),
    (TaxBucket::PreTax, draw_pre_tax),
    (TaxBucket::Roth, draw_roth),
];

pub fn draw_cash(need: Decimal, balance: Decimal, _rates: &EffectiveRates) -> Draw {
    draw_untaxed(need, balance)
}

pub fn draw_taxable(need: Decimal, balance: Decimal, rates: &EffectiveRates) -> Draw {
    draw_grossed_up(need, balance, rates.taxable)
}

pub fn draw_pre_tax(need: Decimal, balance: Decimal, rates: &EffectiveRates) -> Draw {
    draw_grossed_up(need, balance, rates.pre_tax)
}

pub fn draw_roth(need: Decimal, balance: Decimal, _rates: &EffectiveRates) -> Draw {
    draw_untaxed(need, balance)
}

fn draw_untaxed(need: Decimal, balance: Decimal) -> Draw {
    if need <= Decimal::ZERO || balance <= Decimal::ZERO {
        return Draw::nothing(balance);
    }

    let take = need.min(balance);
    Draw {
        gross: take,
        cash: take,
        tax: Decimal::ZERO,
        remaining_balance: balance - take,
    }
}

fn draw_grossed_up(need: Decimal, balance: Decimal, rate: Decimal) -> Draw {
    if need <= Decimal::ZERO || balance <= Decimal::ZERO || rate >= Decimal::ONE {
        return Draw::nothing(balance);
    }

    let keep = Decimal::ONE - rate;
    if let Some(gross_needed) = need.checked_div(keep).filter(|gross| balance >= *gross) {
        return Draw {
            gross: gross_needed,
            cash: need,
            tax: gross_needed - need,
            remaining_balance: balance - gross_needed,
        };
    }

    let cash = balance * keep;
    Draw {
        gross: balance,
        cash,
        tax: balance - cash,
        remaining_balance: Decimal::ZERO,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaterfallOutcome {
    pub unmet_need: Decimal,
    pub taxes_paid: Decimal,
    pub withdrawals: WithdrawalDetails,
}

pub fn run_waterfall(assets: &mut [Asset], need: Decimal, rates: &EffectiveRates) -> WaterfallOutcome {
    let mut outcome = WaterfallOutcome {
        unmet_need: need.max(Decimal::ZERO),
        ..WaterfallOutcome::default()
    };

    for (bucket, handler) in WITHDRAWAL_ORDER {
        if outcome.unmet_need <= Decimal::ZERO {
            break;
        }

        for asset in assets.iter_mut().filter(|a| a.bucket == bucket) {
            if outcome.unmet_need <= Decimal::ZERO {
                break;
            }
            if asset.balance <= Decimal::ZERO {
                continue;
            }

            let draw = handler(outcome.unmet_need, asset.balance, rates);
            asset.balance = draw.remaining_balance;
            outcome.unmet_need -= draw.cash;
            outcome.taxes_paid = outcome.taxes_paid.saturating_add(draw.tax);
            outcome.withdrawals.add(bucket, draw.gross);
        }
    }

    outcome.unmet_need = outcome.unmet_need.max(Decimal::ZERO);
    outcome
}
