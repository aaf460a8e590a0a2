//! Fixed-point money helpers
//!
//! Every monetary value is a `Decimal`. Amounts are kept at cent precision;
//! commission results are rounded half away from zero to the cent before they
//! touch a wallet, so repeated credits never drift.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Error, Result};

/// Default IB commission rate, in percent
pub const DEFAULT_COMMISSION_RATE: Decimal = Decimal::from_parts(50, 0, 0, false, 1);

/// Number of decimal places kept for monetary amounts
pub const MONEY_SCALE: u32 = 2;

/// Decimal places kept for commission rates, matching the `NUMERIC(9, 4)` column
pub const RATE_SCALE: u32 = 4;

/// Parse a decimal string such as `"1000.00"` into an amount
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|_| Error::validation(format!("'{}' is not a decimal amount", raw)))
}

/// Round to cents, half away from zero
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Check that an amount is strictly positive and has at most two decimals
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation("Amount must be greater than zero"));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(Error::validation("Amount must have at most 2 decimal places"));
    }
    Ok(amount)
}

/// Check that a commission rate is a percentage in [0, 100] with at most four decimals
pub fn validate_rate(rate: Decimal) -> Result<Decimal> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(Error::validation(format!(
            "Commission rate {} is outside [0, 100]",
            rate
        )));
    }
    if rate.normalize().scale() > RATE_SCALE {
        return Err(Error::validation(format!(
            "Commission rate {} has more than {} decimal places",
            rate, RATE_SCALE
        )));
    }
    Ok(rate)
}

/// Commission earned on `amount` at `rate` percent, rounded to cents
pub fn commission_for(amount: Decimal, rate: Decimal) -> Result<Decimal> {
    let gross = amount
        .checked_mul(rate)
        .ok_or_else(|| Error::validation("Commission calculation overflowed"))?;
    let mut commission = round_cents(gross / Decimal::ONE_HUNDRED);
    commission.rescale(MONEY_SCALE);
    Ok(commission)
}
