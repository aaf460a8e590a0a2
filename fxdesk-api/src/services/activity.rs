//! Reading the activity log

use std::sync::Arc;

use fxdesk::AdminIdentity;

use crate::database::BrokerageStore;
use crate::error::ServiceResult;
use crate::models::ActivityLog;

pub const DEFAULT_ACTIVITY_LIMIT: usize = 100;
pub const MAX_ACTIVITY_LIMIT: usize = 500;

pub struct ActivityServiceImpl {
    store: Arc<dyn BrokerageStore>,
}

impl ActivityServiceImpl {
    pub fn new(store: Arc<dyn BrokerageStore>) -> Self {
        Self { store }
    }

    /// Newest entries first. `all` spans every admin and needs a super admin;
    /// otherwise only the caller's own entries are returned.
    pub async fn list_activity(
        &self,
        admin: &AdminIdentity,
        all: bool,
        limit: Option<usize>,
    ) -> ServiceResult<Vec<ActivityLog>> {
        if all {
            admin.require_super("Viewing all activity")?;
        }
        let limit = limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT).clamp(1, MAX_ACTIVITY_LIMIT);
        let scope = if all { None } else { Some(admin.id()) };

        let mut tx = self.store.begin().await?;
        tx.list_activity(scope, limit).await
    }
}
