//! Activity audit logging
//!
//! Entries are written through the caller's transaction so they commit or roll
//! back together with the change they describe. A failed write is reported and
//! otherwise ignored.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::StoreTransaction;
use crate::models::ActivityLog;

/// Audited privileged actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ReferralAccepted,
    ReferralRejected,
    CommissionCredited,
    CommissionPayout,
    CommissionRateUpdated,
    WalletEnabled,
    WalletDisabled,
    DepositApproved,
    DepositRejected,
    DepositCompleted,
    DepositFailed,
    AdminCreated,
    AdminDisabled,
    CountryAssigned,
    CountryRemoved,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ReferralAccepted => "referral_accepted",
            AuditAction::ReferralRejected => "referral_rejected",
            AuditAction::CommissionCredited => "commission_credited",
            AuditAction::CommissionPayout => "commission_payout",
            AuditAction::CommissionRateUpdated => "commission_rate_updated",
            AuditAction::WalletEnabled => "wallet_enabled",
            AuditAction::WalletDisabled => "wallet_disabled",
            AuditAction::DepositApproved => "deposit_approved",
            AuditAction::DepositRejected => "deposit_rejected",
            AuditAction::DepositCompleted => "deposit_completed",
            AuditAction::DepositFailed => "deposit_failed",
            AuditAction::AdminCreated => "admin_created",
            AuditAction::AdminDisabled => "admin_disabled",
            AuditAction::CountryAssigned => "country_assigned",
            AuditAction::CountryRemoved => "country_removed",
        }
    }
}

/// Writes [`ActivityLog`] rows
#[derive(Debug, Clone, Default)]
pub struct ActivityLogger;

impl ActivityLogger {
    pub fn new() -> Self {
        Self
    }

    /// Append an entry. Never fails the surrounding operation.
    pub async fn log(
        &self,
        tx: &mut dyn StoreTransaction,
        admin_id: Option<Uuid>,
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<Uuid>,
        details: Option<String>,
    ) {
        let entry = ActivityLog::new(admin_id, action.as_str(), entity_type, entity_id, details);

        match tx.append_activity(&entry).await {
            Ok(()) => info!(
                action = action.as_str(),
                admin_id = ?admin_id,
                entity_type,
                entity_id = ?entity_id,
                "Audit entry recorded"
            ),
            Err(e) => warn!(
                action = action.as_str(),
                admin_id = ?admin_id,
                error = %e,
                "Failed to record audit entry"
            ),
        }
    }
}
