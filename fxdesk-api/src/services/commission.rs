//! Commission wallet administration: payouts, rates and enablement

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use fxdesk::money::{validate_amount, validate_rate, DEFAULT_COMMISSION_RATE};
use fxdesk::{AdminIdentity, IbCbWallet, WalletType};

use crate::database::BrokerageStore;
use crate::error::{ServiceError, ServiceResult};
use crate::middleware::{ActivityLogger, AuditAction};
use crate::models::{NotificationType, WalletEntry};
use crate::observability::DeskMetrics;
use crate::services::load_visible_user;
use crate::services::notifications::Notifier;

pub struct CommissionServiceImpl {
    store: Arc<dyn BrokerageStore>,
    audit: ActivityLogger,
    metrics: Arc<DeskMetrics>,
    notifier: Notifier,
}

impl CommissionServiceImpl {
    pub fn new(
        store: Arc<dyn BrokerageStore>,
        audit: ActivityLogger,
        metrics: Arc<DeskMetrics>,
        notifier: Notifier,
    ) -> Self {
        Self { store, audit, metrics, notifier }
    }

    /// Pay out part of a referrer's balance. Super admins only.
    #[instrument(skip(self, admin, notes), fields(admin_id = %admin.id()))]
    pub async fn payout(
        &self,
        admin: &AdminIdentity,
        referrer_id: Uuid,
        amount: Decimal,
        notes: Option<String>,
    ) -> ServiceResult<IbCbWallet> {
        admin.require_super("Commission payout")?;
        validate_amount(amount)?;

        let mut tx = self.store.begin().await?;
        let mut wallet = tx
            .get_wallet_for_update(referrer_id, WalletType::Ib)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} has no IB wallet", referrer_id)))?;

        wallet.payout(amount, Utc::now())?;
        tx.update_wallet(&wallet).await?;

        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        tx.insert_wallet_entry(&WalletEntry::payout(&wallet, amount, notes.clone(), admin.id()))
            .await?;

        self.audit
            .log(
                tx.as_mut(),
                Some(admin.id()),
                AuditAction::CommissionPayout,
                "ib_cb_wallet",
                Some(wallet.id),
                Some(match &notes {
                    Some(notes) => format!("paid {} to {}: {}", amount, referrer_id, notes),
                    None => format!("paid {} to {}", amount, referrer_id),
                }),
            )
            .await;

        tx.commit().await?;
        self.metrics.payouts_total.inc();
        info!(referrer_id = %referrer_id, amount = %amount, balance = %wallet.balance, "Commission paid out");

        self.notifier
            .send(
                referrer_id,
                "Commission payout",
                &format!("A commission payout of ${} has been processed", amount),
                NotificationType::Payout,
            )
            .await;

        Ok(wallet)
    }

    /// Change the commission rate of a referrer, creating the wallet if needed.
    /// Super admins only.
    #[instrument(skip(self, admin), fields(admin_id = %admin.id()))]
    pub async fn update_commission_rate(
        &self,
        admin: &AdminIdentity,
        referrer_id: Uuid,
        rate: Decimal,
    ) -> ServiceResult<IbCbWallet> {
        admin.require_super("Commission rate change")?;
        validate_rate(rate)?;

        let mut tx = self.store.begin().await?;
        if tx.get_user(referrer_id).await?.is_none() {
            return Err(ServiceError::not_found("User", referrer_id));
        }

        let mut wallet = tx
            .ensure_wallet(referrer_id, WalletType::Ib, DEFAULT_COMMISSION_RATE)
            .await?;
        let previous = wallet.set_rate(rate, Utc::now())?;
        tx.update_wallet(&wallet).await?;

        self.audit
            .log(
                tx.as_mut(),
                Some(admin.id()),
                AuditAction::CommissionRateUpdated,
                "ib_cb_wallet",
                Some(wallet.id),
                Some(format!("rate {}% -> {}%", previous, rate)),
            )
            .await;

        tx.commit().await?;
        info!(referrer_id = %referrer_id, previous = %previous, rate = %rate, "Commission rate updated");
        Ok(wallet)
    }

    /// Enable or disable an existing wallet. Super admins only.
    #[instrument(skip(self, admin), fields(admin_id = %admin.id()))]
    pub async fn set_wallet_enabled(
        &self,
        admin: &AdminIdentity,
        referrer_id: Uuid,
        enabled: bool,
    ) -> ServiceResult<IbCbWallet> {
        admin.require_super("Wallet toggle")?;

        let mut tx = self.store.begin().await?;
        let mut wallet = tx
            .get_wallet_for_update(referrer_id, WalletType::Ib)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} has no IB wallet", referrer_id)))?;

        if wallet.enabled != enabled {
            wallet.set_enabled(enabled, Utc::now());
            tx.update_wallet(&wallet).await?;
            let action = if enabled {
                AuditAction::WalletEnabled
            } else {
                AuditAction::WalletDisabled
            };
            self.audit
                .log(tx.as_mut(), Some(admin.id()), action, "ib_cb_wallet", Some(wallet.id), None)
                .await;
            tx.commit().await?;
            info!(referrer_id = %referrer_id, enabled, "Wallet toggled");
        }

        Ok(wallet)
    }

    /// Ledger of a referrer's IB wallet, oldest first
    pub async fn wallet_entries(&self, admin: &AdminIdentity, referrer_id: Uuid) -> ServiceResult<Vec<WalletEntry>> {
        let mut tx = self.store.begin().await?;
        load_visible_user(tx.as_mut(), admin, referrer_id, false).await?;
        let wallet = tx
            .get_wallet(referrer_id, WalletType::Ib)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} has no IB wallet", referrer_id)))?;
        tx.list_wallet_entries(wallet.id).await
    }
}
