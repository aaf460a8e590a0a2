//! In-app notifications delivered to clients

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fxdesk::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Referral,
    Commission,
    Payout,
    Deposit,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Referral => "referral",
            NotificationType::Commission => "commission",
            NotificationType::Payout => "payout",
            NotificationType::Deposit => "deposit",
        }
    }
}

impl FromStr for NotificationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "referral" => Ok(NotificationType::Referral),
            "commission" => Ok(NotificationType::Commission),
            "payout" => Ok(NotificationType::Payout),
            "deposit" => Ok(NotificationType::Deposit),
            other => Err(Error::validation(format!("Unknown notification type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, title: impl Into<String>, message: impl Into<String>, notification_type: NotificationType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            message: message.into(),
            notification_type,
            read: false,
            created_at: Utc::now(),
        }
    }
}
