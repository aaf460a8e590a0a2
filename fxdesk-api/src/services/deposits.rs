//! Admin decisions on client deposits

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use fxdesk::AdminIdentity;

use crate::database::{BrokerageStore, StoreTransaction};
use crate::error::{ServiceError, ServiceResult};
use crate::middleware::{ActivityLogger, AuditAction};
use crate::models::Deposit;
use crate::services::load_visible_user;
use crate::services::settlement::{SettlementEngine, SettlementOutcome};

/// Approved deposit together with what settlement did with it
#[derive(Debug, Clone, Serialize)]
pub struct DepositApproval {
    pub deposit: Deposit,
    pub settlement: SettlementOutcome,
}

pub struct DepositServiceImpl {
    store: Arc<dyn BrokerageStore>,
    audit: ActivityLogger,
    settlement: Arc<SettlementEngine>,
}

impl DepositServiceImpl {
    pub fn new(store: Arc<dyn BrokerageStore>, audit: ActivityLogger, settlement: Arc<SettlementEngine>) -> Self {
        Self { store, audit, settlement }
    }

    async fn load_visible_deposit(
        tx: &mut dyn StoreTransaction,
        admin: &AdminIdentity,
        deposit_id: Uuid,
    ) -> ServiceResult<Deposit> {
        let deposit = tx
            .get_deposit_for_update(deposit_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Deposit", deposit_id))?;
        // deposits are scoped through their owner
        match load_visible_user(tx, admin, deposit.user_id, false).await {
            Ok(_) => Ok(deposit),
            Err(ServiceError::NotFound(_)) => Err(ServiceError::not_found("Deposit", deposit_id)),
            Err(e) => Err(e),
        }
    }

    /// Approve a pending deposit and settle commission for it
    #[instrument(skip(self, admin), fields(admin_id = %admin.id()))]
    pub async fn approve_deposit(
        &self,
        admin: &AdminIdentity,
        deposit_id: Uuid,
        amount: Option<Decimal>,
    ) -> ServiceResult<DepositApproval> {
        let mut tx = self.store.begin().await?;
        let mut deposit = Self::load_visible_deposit(tx.as_mut(), admin, deposit_id).await?;
        let requested = deposit.amount;

        deposit.approve(admin.id(), amount, Utc::now())?;
        tx.update_deposit(&deposit).await?;

        let details = if deposit.amount != requested {
            format!("approved {} (requested {})", deposit.amount, requested)
        } else {
            format!("approved {}", deposit.amount)
        };
        self.audit
            .log(
                tx.as_mut(),
                Some(admin.id()),
                AuditAction::DepositApproved,
                "deposit",
                Some(deposit.id),
                Some(details),
            )
            .await;

        let settlement = self
            .settlement
            .settle_deposit(tx.as_mut(), &deposit, Some(admin.id()))
            .await?;

        tx.commit().await?;
        info!(deposit_id = %deposit.id, amount = %deposit.amount, "Deposit approved");
        self.settlement.after_commit(&settlement).await;

        Ok(DepositApproval { deposit, settlement })
    }

    #[instrument(skip(self, admin, reason), fields(admin_id = %admin.id()))]
    pub async fn reject_deposit(&self, admin: &AdminIdentity, deposit_id: Uuid, reason: &str) -> ServiceResult<Deposit> {
        let mut tx = self.store.begin().await?;
        let mut deposit = Self::load_visible_deposit(tx.as_mut(), admin, deposit_id).await?;

        deposit.reject(admin.id(), reason, Utc::now())?;
        tx.update_deposit(&deposit).await?;

        self.audit
            .log(
                tx.as_mut(),
                Some(admin.id()),
                AuditAction::DepositRejected,
                "deposit",
                Some(deposit.id),
                deposit.rejection_reason.clone(),
            )
            .await;

        tx.commit().await?;
        info!(deposit_id = %deposit.id, "Deposit rejected");
        Ok(deposit)
    }
}
