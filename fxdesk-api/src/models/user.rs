//! Client user model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fxdesk::referral::{status_label, ReferralLink};

/// Client of the brokerage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    /// Code this user shares with the people it refers
    pub referral_code: String,
    /// Who referred this user, and where that referral stands
    pub referral: Option<ReferralLink>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        full_name: impl Into<String>,
        country: Option<String>,
        city: Option<String>,
        referral_code: impl Into<String>,
        referral: Option<ReferralLink>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            full_name: full_name.into(),
            country,
            city,
            referral_code: referral_code.into(),
            referral,
            created_at: Utc::now(),
        }
    }

    pub fn referred_by(&self) -> Option<Uuid> {
        self.referral.as_ref().map(|link| link.referred_by)
    }

    pub fn referral_status(&self) -> &'static str {
        status_label(self.referral.as_ref())
    }
}
