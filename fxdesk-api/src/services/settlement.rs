//! Commission settlement engine
//!
//! Admin approvals and provider callbacks both end here once a deposit has
//! reached a funds-credited state. The engine runs inside the caller's
//! transaction; the caller commits and then hands the outcome back to
//! [`SettlementEngine::after_commit`] for metrics and notifications.
//!
//! A deposit is credited at most once. The first guard is the lookup of an
//! existing commission entry for the deposit; the store additionally keeps
//! that deposit reference unique, so a racing second credit fails the
//! transaction instead of landing.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use fxdesk::money::{commission_for, DEFAULT_COMMISSION_RATE};
use fxdesk::{ReferralStatus, WalletType};

use crate::database::StoreTransaction;
use crate::error::{ServiceError, ServiceResult};
use crate::middleware::{ActivityLogger, AuditAction};
use crate::models::{Deposit, NotificationType, WalletEntry};
use crate::observability::DeskMetrics;
use crate::services::notifications::Notifier;

/// Commission applied to a referrer's wallet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionCredit {
    pub referrer_id: Uuid,
    pub wallet_id: Uuid,
    pub deposit_id: Uuid,
    pub depositor_email: String,
    pub amount: Decimal,
    pub balance: Decimal,
    pub total_commission: Decimal,
}

/// What settling a funded deposit did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    AlreadySettled,
    NoReferral,
    ReferralNotAccepted { status: ReferralStatus },
    WalletDisabled { referrer_id: Uuid },
    ZeroCommission { referrer_id: Uuid },
    Credited(CommissionCredit),
}

impl SettlementOutcome {
    pub fn credit(&self) -> Option<&CommissionCredit> {
        match self {
            SettlementOutcome::Credited(credit) => Some(credit),
            _ => None,
        }
    }

    /// Metric label for outcomes that credited nothing
    pub fn skip_reason(&self) -> Option<&'static str> {
        match self {
            SettlementOutcome::AlreadySettled => Some("already_settled"),
            SettlementOutcome::NoReferral => Some("no_referral"),
            SettlementOutcome::ReferralNotAccepted { .. } => Some("referral_not_accepted"),
            SettlementOutcome::WalletDisabled { .. } => Some("wallet_disabled"),
            SettlementOutcome::ZeroCommission { .. } => Some("zero_commission"),
            SettlementOutcome::Credited(_) => None,
        }
    }
}

pub struct SettlementEngine {
    audit: ActivityLogger,
    metrics: Arc<DeskMetrics>,
    notifier: Notifier,
}

impl SettlementEngine {
    pub fn new(audit: ActivityLogger, metrics: Arc<DeskMetrics>, notifier: Notifier) -> Self {
        Self { audit, metrics, notifier }
    }

    /// Credit the referrer of the depositor, if the deposit earns commission.
    ///
    /// `actor` is the approving admin, or `None` for provider callbacks.
    #[instrument(skip(self, tx, deposit), fields(deposit_id = %deposit.id, amount = %deposit.amount))]
    pub async fn settle_deposit(
        &self,
        tx: &mut dyn StoreTransaction,
        deposit: &Deposit,
        actor: Option<Uuid>,
    ) -> ServiceResult<SettlementOutcome> {
        if !deposit.status.is_funds_credited() {
            return Err(ServiceError::Internal(format!(
                "Deposit {} is {}, only funded deposits can be settled",
                deposit.id, deposit.status
            )));
        }

        if tx.find_commission_entry(deposit.id).await?.is_some() {
            info!("Deposit already settled");
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let depositor = tx
            .get_user(deposit.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", deposit.user_id))?;

        let link = match &depositor.referral {
            Some(link) => link,
            None => return Ok(SettlementOutcome::NoReferral),
        };
        if !link.earns_commission() {
            return Ok(SettlementOutcome::ReferralNotAccepted { status: link.status });
        }
        let referrer_id = link.referred_by;

        let mut wallet = tx
            .ensure_wallet(referrer_id, WalletType::Ib, DEFAULT_COMMISSION_RATE)
            .await?;
        if !wallet.enabled {
            info!(referrer_id = %referrer_id, "Referrer wallet disabled, no commission");
            return Ok(SettlementOutcome::WalletDisabled { referrer_id });
        }

        let commission = commission_for(deposit.amount, wallet.commission_rate)?;
        if commission.is_zero() {
            return Ok(SettlementOutcome::ZeroCommission { referrer_id });
        }

        wallet.credit_commission(commission, Utc::now())?;
        tx.update_wallet(&wallet).await?;
        tx.insert_wallet_entry(&WalletEntry::commission(&wallet, deposit.id, commission, actor))
            .await?;

        self.audit
            .log(
                tx,
                actor,
                AuditAction::CommissionCredited,
                "ib_cb_wallet",
                Some(wallet.id),
                Some(format!(
                    "deposit {} of {} by {} at {}% credited {}",
                    deposit.id, deposit.amount, depositor.email, wallet.commission_rate, commission
                )),
            )
            .await;

        info!(
            referrer_id = %referrer_id,
            commission = %commission,
            balance = %wallet.balance,
            "Commission credited"
        );

        Ok(SettlementOutcome::Credited(CommissionCredit {
            referrer_id,
            wallet_id: wallet.id,
            deposit_id: deposit.id,
            depositor_email: depositor.email,
            amount: commission,
            balance: wallet.balance,
            total_commission: wallet.total_commission,
        }))
    }

    /// Side effects that must only happen once the credit is durable
    pub async fn after_commit(&self, outcome: &SettlementOutcome) {
        match outcome {
            SettlementOutcome::Credited(credit) => {
                self.metrics.record_commission(credit.amount);
                self.notifier
                    .send(
                        credit.referrer_id,
                        "Commission earned",
                        &format!(
                            "You earned ${} commission from a deposit by {}",
                            credit.amount, credit.depositor_email
                        ),
                        NotificationType::Commission,
                    )
                    .await;
            }
            other => {
                if let Some(reason) = other.skip_reason() {
                    self.metrics.settlements_skipped_total.with_label_values(&[reason]).inc();
                }
            }
        }
    }
}
