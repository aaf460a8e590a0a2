//! Commission wallet ledger

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fxdesk::{Error, IbCbWallet, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletEntryKind {
    Commission,
    Payout,
}

impl WalletEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletEntryKind::Commission => "Commission",
            WalletEntryKind::Payout => "Payout",
        }
    }
}

impl FromStr for WalletEntryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Commission" => Ok(WalletEntryKind::Commission),
            "Payout" => Ok(WalletEntryKind::Payout),
            other => Err(Error::validation(format!("Unknown wallet entry kind '{}'", other))),
        }
    }
}

/// One movement on a commission wallet.
///
/// Commission entries carry the deposit they were earned on; the store keeps
/// that column unique, so a deposit can never be credited twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: WalletEntryKind,
    pub deposit_id: Option<Uuid>,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub notes: Option<String>,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WalletEntry {
    /// Entry for a credit already applied to `wallet`
    pub fn commission(wallet: &IbCbWallet, deposit_id: Uuid, amount: Decimal, actor_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            kind: WalletEntryKind::Commission,
            deposit_id: Some(deposit_id),
            amount,
            balance_after: wallet.balance,
            notes: None,
            actor_id,
            created_at: wallet.updated_at,
        }
    }

    /// Entry for a payout already applied to `wallet`
    pub fn payout(wallet: &IbCbWallet, amount: Decimal, notes: Option<String>, actor_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            kind: WalletEntryKind::Payout,
            deposit_id: None,
            amount,
            balance_after: wallet.balance,
            notes,
            actor_id: Some(actor_id),
            created_at: wallet.updated_at,
        }
    }
}
