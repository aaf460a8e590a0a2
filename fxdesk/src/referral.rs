//! Referral lifecycle of a referred client
//!
//! A client either has no referrer at all, or carries a [`ReferralLink`]
//! pointing at the referring user. Keeping the referrer id and the status in
//! one optional value means a status can never exist without a referrer, and
//! the other way round.
//!
//! ```text
//! None ──(signup with no / unknown code)──> None            (permanent)
//! Pending ──accept──> Accepted                              (terminal)
//! Pending ──reject(reason)──> Rejected                      (terminal)
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Prefix of every generated referral code
pub const REFERRAL_CODE_PREFIX: &str = "REF";

/// Status of a referral link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferralStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "Pending",
            ReferralStatus::Accepted => "Accepted",
            ReferralStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(ReferralStatus::Pending),
            "Accepted" => Ok(ReferralStatus::Accepted),
            "Rejected" => Ok(ReferralStatus::Rejected),
            other => Err(Error::validation(format!("Unknown referral status '{}'", other))),
        }
    }
}

/// Back-reference from a referred client to its referrer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralLink {
    pub referred_by: Uuid,
    pub status: ReferralStatus,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl ReferralLink {
    /// New link awaiting an admin decision
    pub fn pending(referred_by: Uuid) -> Self {
        Self {
            referred_by,
            status: ReferralStatus::Pending,
            decided_by: None,
            decided_at: None,
            rejection_reason: None,
        }
    }

    /// Pending -> Accepted
    pub fn accept(&mut self, admin_id: Option<Uuid>, at: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = ReferralStatus::Accepted;
        self.decided_by = admin_id;
        self.decided_at = Some(at);
        Ok(())
    }

    /// Pending -> Rejected. The reason is mandatory.
    pub fn reject(&mut self, admin_id: Option<Uuid>, reason: &str, at: DateTime<Utc>) -> Result<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::validation("A reason is required to reject a referral"));
        }
        self.ensure_pending()?;
        self.status = ReferralStatus::Rejected;
        self.decided_by = admin_id;
        self.decided_at = Some(at);
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    /// Only accepted referrals accrue commission for the referrer
    pub fn earns_commission(&self) -> bool {
        self.status == ReferralStatus::Accepted
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.status != ReferralStatus::Pending {
            return Err(Error::invalid_transition("referral", self.status));
        }
        Ok(())
    }
}

/// Human readable status of an optional link, `None` when there is no referrer
pub fn status_label(link: Option<&ReferralLink>) -> &'static str {
    link.map(|l| l.status.as_str()).unwrap_or("None")
}

fn ref_param_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[?&#;])ref=([A-Za-z0-9_-]+)").expect("referral pattern is valid")
    })
}

fn bare_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("code pattern is valid"))
}

/// Pull a referral code out of a signup token.
///
/// The token is either the bare code (`REFXYZ123`) or a link carrying it as a
/// `ref` query parameter (`https://portal.example/signup?ref=REFXYZ123`).
/// Anything else yields `None`.
pub fn extract_referral_code(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if let Some(captures) = ref_param_pattern().captures(token) {
        return captures.get(1).map(|m| m.as_str().to_string());
    }

    if bare_code_pattern().is_match(token) {
        Some(token.to_string())
    } else {
        None
    }
}

/// Generate a shareable referral code: `REF` followed by six upper-case characters
pub fn generate_referral_code() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("{}{}", REFERRAL_CODE_PREFIX, suffix)
}
