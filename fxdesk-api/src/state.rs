//! Application state management

use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::BrokerageStore;
use crate::error::ServiceError;
use crate::middleware::{ActivityLogger, AuthService};
use crate::observability::DeskMetrics;
use crate::services::{
    activity::ActivityServiceImpl,
    admins::AdminServiceImpl,
    back_office::BackOfficeServiceImpl,
    client::ClientServiceImpl,
    commission::CommissionServiceImpl,
    deposits::DepositServiceImpl,
    notifications::{Notifier, StoreNotificationSink},
    payments::PaymentWebhookService,
    referral::ReferralServiceImpl,
    settlement::SettlementEngine,
};

/// Application state shared across HTTP handlers
pub struct AppState {
    pub config: AppConfig,
    /// Persistence backend (Postgres or in-memory)
    pub store: Arc<dyn BrokerageStore>,
    pub auth: Arc<AuthService>,
    pub metrics: Arc<DeskMetrics>,

    pub client: ClientServiceImpl,
    pub referrals: ReferralServiceImpl,
    pub commissions: CommissionServiceImpl,
    pub deposits: DepositServiceImpl,
    pub payments: PaymentWebhookService,
    pub back_office: BackOfficeServiceImpl,
    pub admins: AdminServiceImpl,
    pub activity: ActivityServiceImpl,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn BrokerageStore>) -> Result<Self, ServiceError> {
        let metrics = Arc::new(
            DeskMetrics::new().map_err(|e| ServiceError::Internal(format!("Metrics registry: {}", e)))?,
        );
        let auth = Arc::new(AuthService::new(store.clone(), &config.auth));
        let audit = ActivityLogger::new();
        let notifier = Notifier::new(Arc::new(StoreNotificationSink::new(store.clone())));
        let settlement = Arc::new(SettlementEngine::new(audit.clone(), metrics.clone(), notifier.clone()));

        Ok(Self {
            client: ClientServiceImpl::new(store.clone(), auth.clone()),
            referrals: ReferralServiceImpl::new(store.clone(), audit.clone(), metrics.clone(), notifier.clone()),
            commissions: CommissionServiceImpl::new(store.clone(), audit.clone(), metrics.clone(), notifier),
            deposits: DepositServiceImpl::new(store.clone(), audit.clone(), settlement.clone()),
            payments: PaymentWebhookService::new(store.clone(), audit.clone(), metrics.clone(), settlement),
            back_office: BackOfficeServiceImpl::new(store.clone()),
            admins: AdminServiceImpl::new(store.clone(), audit),
            activity: ActivityServiceImpl::new(store.clone()),
            config,
            store,
            auth,
            metrics,
        })
    }
}
