//! Back-office administrator accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fxdesk::AdminRole;

/// Administrator account. Admins are disabled, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: AdminRole,
    pub enabled: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl AdminUser {
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: AdminRole, created_by: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: name.into(),
            role,
            enabled: true,
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// Country a middle admin is allowed to see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminCountryAssignment {
    pub admin_id: Uuid,
    pub country: String,
    pub created_at: DateTime<Utc>,
}
