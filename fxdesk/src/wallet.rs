//! IB / CB commission wallet
//!
//! `total_commission` is the lifetime amount ever credited and only grows;
//! `balance` is what is still owed to the owner and shrinks on payout. Both are
//! moved together on every credit, which keeps `0 <= balance <= total_commission`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::money::{validate_amount, validate_rate};

/// Wallet flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletType {
    #[serde(rename = "IB")]
    Ib,
    #[serde(rename = "CB")]
    Cb,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Ib => "IB",
            WalletType::Cb => "CB",
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "IB" => Ok(WalletType::Ib),
            "CB" => Ok(WalletType::Cb),
            other => Err(Error::validation(format!("Unknown wallet type '{}'", other))),
        }
    }
}

/// Commission wallet owned by exactly one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IbCbWallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_type: WalletType,
    pub balance: Decimal,
    pub commission_rate: Decimal,
    pub total_commission: Decimal,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IbCbWallet {
    pub fn new(user_id: Uuid, wallet_type: WalletType, commission_rate: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            wallet_type,
            balance: Decimal::ZERO,
            commission_rate,
            total_commission: Decimal::ZERO,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add earned commission to both the spendable balance and the lifetime total
    pub fn credit_commission(&mut self, amount: Decimal, now: DateTime<Utc>) -> Result<()> {
        if amount < Decimal::ZERO {
            return Err(Error::validation("Commission cannot be negative"));
        }
        self.balance += amount;
        self.total_commission += amount;
        self.updated_at = now;
        Ok(())
    }

    /// Pay `amount` out of the balance. The lifetime total is untouched.
    pub fn payout(&mut self, amount: Decimal, now: DateTime<Utc>) -> Result<()> {
        validate_amount(amount)?;
        if amount > self.balance {
            return Err(Error::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.updated_at = now;
        Ok(())
    }

    /// Change the commission rate, returning the previous one
    pub fn set_rate(&mut self, rate: Decimal, now: DateTime<Utc>) -> Result<Decimal> {
        validate_rate(rate)?;
        let previous = self.commission_rate;
        self.commission_rate = rate;
        self.updated_at = now;
        Ok(previous)
    }

    pub fn set_enabled(&mut self, enabled: bool, now: DateTime<Utc>) {
        self.enabled = enabled;
        self.updated_at = now;
    }

    pub fn invariant_holds(&self) -> bool {
        self.balance >= Decimal::ZERO && self.total_commission >= self.balance
    }
}
