//! Append-only activity log of privileged actions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: Uuid,
    /// `None` for actions taken by the system, such as webhook settlements
    pub admin_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(
        admin_id: Option<Uuid>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: Option<Uuid>,
        details: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            admin_id,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id,
            details,
            created_at: Utc::now(),
        }
    }
}
