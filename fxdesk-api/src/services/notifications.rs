//! Client notifications
//!
//! Notifications are sent after the triggering transaction has committed.
//! Delivery is best effort: a failure is logged and never undoes the change
//! that caused it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::BrokerageStore;
use crate::error::ServiceResult;
use crate::models::{Notification, NotificationType};

/// Destination for client notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        notification_type: NotificationType,
    ) -> ServiceResult<()>;
}

/// Persists notifications so clients can read them back
pub struct StoreNotificationSink {
    store: Arc<dyn BrokerageStore>,
}

impl StoreNotificationSink {
    pub fn new(store: Arc<dyn BrokerageStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationSink for StoreNotificationSink {
    async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        notification_type: NotificationType,
    ) -> ServiceResult<()> {
        let notification = Notification::new(user_id, title, message, notification_type);
        let mut tx = self.store.begin().await?;
        tx.insert_notification(&notification).await?;
        tx.commit().await
    }
}

/// Fire-and-forget front of a [`NotificationSink`]
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub async fn send(&self, user_id: Uuid, title: &str, message: &str, notification_type: NotificationType) {
        match self.sink.notify(user_id, title, message, notification_type).await {
            Ok(()) => debug!(user_id = %user_id, kind = notification_type.as_str(), "Notification sent"),
            Err(e) => warn!(
                user_id = %user_id,
                kind = notification_type.as_str(),
                error = %e,
                "Failed to send notification"
            ),
        }
    }
}
