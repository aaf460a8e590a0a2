//! Referral decisions

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use fxdesk::money::DEFAULT_COMMISSION_RATE;
use fxdesk::{AdminIdentity, WalletType};

use crate::database::BrokerageStore;
use crate::error::{ServiceError, ServiceResult};
use crate::middleware::{ActivityLogger, AuditAction};
use crate::models::{NotificationType, User};
use crate::observability::DeskMetrics;
use crate::services::load_visible_user;
use crate::services::notifications::Notifier;

/// Referral service implementation
pub struct ReferralServiceImpl {
    store: Arc<dyn BrokerageStore>,
    audit: ActivityLogger,
    metrics: Arc<DeskMetrics>,
    notifier: Notifier,
}

impl ReferralServiceImpl {
    pub fn new(
        store: Arc<dyn BrokerageStore>,
        audit: ActivityLogger,
        metrics: Arc<DeskMetrics>,
        notifier: Notifier,
    ) -> Self {
        Self { store, audit, metrics, notifier }
    }

    /// Pending -> Accepted, making sure the referrer has an enabled IB wallet
    #[instrument(skip(self, admin), fields(admin_id = %admin.id()))]
    pub async fn accept_referral(&self, admin: &AdminIdentity, user_id: Uuid) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        let now = Utc::now();

        let mut user = load_visible_user(tx.as_mut(), admin, user_id, true).await?;
        let link = user
            .referral
            .as_mut()
            .ok_or_else(|| ServiceError::InvalidStateTransition {
                entity: "referral".to_string(),
                current: "None".to_string(),
            })?;
        link.accept(Some(admin.id()), now)?;
        let referrer_id = link.referred_by;
        tx.update_user(&user).await?;

        let mut wallet = tx
            .ensure_wallet(referrer_id, WalletType::Ib, DEFAULT_COMMISSION_RATE)
            .await?;
        if !wallet.enabled {
            wallet.set_enabled(true, now);
            tx.update_wallet(&wallet).await?;
            self.audit
                .log(
                    tx.as_mut(),
                    Some(admin.id()),
                    AuditAction::WalletEnabled,
                    "ib_cb_wallet",
                    Some(wallet.id),
                    Some(format!("re-enabled on referral of {}", user.email)),
                )
                .await;
        }

        self.audit
            .log(
                tx.as_mut(),
                Some(admin.id()),
                AuditAction::ReferralAccepted,
                "user",
                Some(user.id),
                Some(format!("{} accepted as referral of {}", user.email, referrer_id)),
            )
            .await;

        tx.commit().await?;
        self.metrics.referral_decisions_total.with_label_values(&["accepted"]).inc();
        info!(user_id = %user.id, referrer_id = %referrer_id, "Referral accepted");

        self.notifier
            .send(
                referrer_id,
                "Referral accepted",
                &format!("{} has been accepted as your referral", user.full_name),
                NotificationType::Referral,
            )
            .await;

        Ok(user)
    }

    /// Pending -> Rejected with a mandatory reason
    #[instrument(skip(self, admin, reason), fields(admin_id = %admin.id()))]
    pub async fn reject_referral(&self, admin: &AdminIdentity, user_id: Uuid, reason: &str) -> ServiceResult<User> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::validation("A reason is required to reject a referral"));
        }

        let mut tx = self.store.begin().await?;
        let mut user = load_visible_user(tx.as_mut(), admin, user_id, true).await?;
        let link = user
            .referral
            .as_mut()
            .ok_or_else(|| ServiceError::InvalidStateTransition {
                entity: "referral".to_string(),
                current: "None".to_string(),
            })?;
        link.reject(Some(admin.id()), reason, Utc::now())?;
        tx.update_user(&user).await?;

        self.audit
            .log(
                tx.as_mut(),
                Some(admin.id()),
                AuditAction::ReferralRejected,
                "user",
                Some(user.id),
                Some(reason.to_string()),
            )
            .await;

        tx.commit().await?;
        self.metrics.referral_decisions_total.with_label_values(&["rejected"]).inc();
        info!(user_id = %user.id, "Referral rejected");

        Ok(user)
    }
}
