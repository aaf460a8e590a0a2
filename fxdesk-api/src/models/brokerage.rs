//! Trading accounts, deposits, withdrawals and KYC documents

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fxdesk::money::validate_amount;
use fxdesk::{Error, Result};

/// Account on the trading platform owned by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Platform account number
    pub login: String,
    pub account_type: String,
    pub currency: String,
    pub leverage: i32,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Deposit lifecycle.
///
/// `Approved` is reached through an admin decision and `Completed` through the
/// payment provider; both mean the funds were credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepositStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
    Failed,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "Pending",
            DepositStatus::Approved => "Approved",
            DepositStatus::Completed => "Completed",
            DepositStatus::Rejected => "Rejected",
            DepositStatus::Failed => "Failed",
        }
    }

    pub fn is_funds_credited(&self) -> bool {
        matches!(self, DepositStatus::Approved | DepositStatus::Completed)
    }

    pub const ALL: [DepositStatus; 5] = [
        DepositStatus::Pending,
        DepositStatus::Approved,
        DepositStatus::Completed,
        DepositStatus::Rejected,
        DepositStatus::Failed,
    ];
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DepositStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::validation(format!("Unknown deposit status '{}'", s)))
    }
}

/// Client deposit into a trading account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub trading_account_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: String,
    /// Payment provider invoice reference
    pub invoice_id: Option<String>,
    pub status: DepositStatus,
    pub decided_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deposit {
    pub fn new(
        user_id: Uuid,
        trading_account_id: Option<Uuid>,
        amount: Decimal,
        method: impl Into<String>,
        invoice_id: Option<String>,
    ) -> Result<Self> {
        validate_amount(amount)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            trading_account_id,
            amount,
            method: method.into(),
            invoice_id,
            status: DepositStatus::Pending,
            decided_by: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Admin approval, optionally correcting the credited amount
    pub fn approve(&mut self, admin_id: Uuid, amount: Option<Decimal>, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        if let Some(amount) = amount {
            self.amount = validate_amount(amount)?;
        }
        self.status = DepositStatus::Approved;
        self.decided_by = Some(admin_id);
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, admin_id: Uuid, reason: &str, now: DateTime<Utc>) -> Result<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::validation("A reason is required to reject a deposit"));
        }
        self.ensure_pending()?;
        self.status = DepositStatus::Rejected;
        self.decided_by = Some(admin_id);
        self.rejection_reason = Some(reason.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Provider reported the invoice as paid
    pub fn complete(&mut self, paid_amount: Decimal, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.amount = validate_amount(paid_amount)?;
        self.status = DepositStatus::Completed;
        self.updated_at = now;
        Ok(())
    }

    /// Provider reported the invoice as failed, expired or canceled
    pub fn fail(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = DepositStatus::Failed;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.status != DepositStatus::Pending {
            return Err(Error::invalid_transition("deposit", self.status));
        }
        Ok(())
    }
}

/// Review state shared by withdrawals and KYC documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "Pending",
            ReviewStatus::Approved => "Approved",
            ReviewStatus::Rejected => "Rejected",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(ReviewStatus::Pending),
            "Approved" => Ok(ReviewStatus::Approved),
            "Rejected" => Ok(ReviewStatus::Rejected),
            other => Err(Error::validation(format!("Unknown review status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub trading_account_id: Uuid,
    pub amount: Decimal,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_type: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(amount: &str) -> Deposit {
        Deposit::new(Uuid::new_v4(), None, amount.parse().unwrap(), "bank_transfer", None).unwrap()
    }

    #[test]
    fn approve_with_override_replaces_amount() {
        let mut deposit = pending("900");
        deposit.approve(Uuid::new_v4(), Some("1000".parse().unwrap()), Utc::now()).unwrap();
        assert_eq!(deposit.status, DepositStatus::Approved);
        assert_eq!(deposit.amount, "1000".parse::<Decimal>().unwrap());
        assert!(deposit.status.is_funds_credited());
    }

    #[test]
    fn decided_deposits_cannot_transition_again() {
        let mut deposit = pending("10");
        deposit.complete("10".parse().unwrap(), Utc::now()).unwrap();
        let err = deposit.approve(Uuid::new_v4(), None, Utc::now()).unwrap_err();
        assert_eq!(err, Error::invalid_transition("deposit", "Completed"));
        assert!(deposit.fail(Utc::now()).is_err());
    }

    #[test]
    fn reject_needs_reason_and_zero_override_is_refused() {
        let mut deposit = pending("10");
        assert!(matches!(deposit.reject(Uuid::new_v4(), " ", Utc::now()), Err(Error::Validation(_))));
        assert!(deposit.approve(Uuid::new_v4(), Some(Decimal::ZERO), Utc::now()).is_err());
        assert_eq!(deposit.status, DepositStatus::Pending);
    }

    #[test]
    fn status_parses_from_text() {
        for status in DepositStatus::ALL {
            assert_eq!(status.as_str().parse::<DepositStatus>().unwrap(), status);
        }
    }
}
