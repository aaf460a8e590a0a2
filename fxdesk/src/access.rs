//! Administrator roles and country-scoped visibility
//!
//! Visibility is decided by matching on [`AdminIdentity`]; adding a role means
//! adding a variant, and the compiler then points at every place that has to
//! decide what the new role may see.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Role stored on an admin account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    SuperAdmin,
    MiddleAdmin,
    NormalAdmin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::SuperAdmin => "super_admin",
            AdminRole::MiddleAdmin => "middle_admin",
            AdminRole::NormalAdmin => "normal_admin",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "super_admin" => Ok(AdminRole::SuperAdmin),
            "middle_admin" => Ok(AdminRole::MiddleAdmin),
            "normal_admin" => Ok(AdminRole::NormalAdmin),
            other => Err(Error::validation(format!("Unknown admin role '{}'", other))),
        }
    }
}

/// Canonical form used when comparing countries
pub fn normalize_country(country: &str) -> Option<String> {
    let trimmed = country.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Authenticated administrator together with what it is allowed to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminIdentity {
    SuperAdmin { id: Uuid },
    /// Scoped to a set of normalized country names
    MiddleAdmin { id: Uuid, countries: BTreeSet<String> },
    /// Currently unscoped, like a super admin, but without super-admin actions
    NormalAdmin { id: Uuid },
}

impl AdminIdentity {
    pub fn new<I, S>(id: Uuid, role: AdminRole, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match role {
            AdminRole::SuperAdmin => AdminIdentity::SuperAdmin { id },
            AdminRole::MiddleAdmin => AdminIdentity::MiddleAdmin {
                id,
                countries: countries
                    .into_iter()
                    .filter_map(|c| normalize_country(c.as_ref()))
                    .collect(),
            },
            AdminRole::NormalAdmin => AdminIdentity::NormalAdmin { id },
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            AdminIdentity::SuperAdmin { id }
            | AdminIdentity::MiddleAdmin { id, .. }
            | AdminIdentity::NormalAdmin { id } => *id,
        }
    }

    pub fn role(&self) -> AdminRole {
        match self {
            AdminIdentity::SuperAdmin { .. } => AdminRole::SuperAdmin,
            AdminIdentity::MiddleAdmin { .. } => AdminRole::MiddleAdmin,
            AdminIdentity::NormalAdmin { .. } => AdminRole::NormalAdmin,
        }
    }

    pub fn is_super(&self) -> bool {
        matches!(self, AdminIdentity::SuperAdmin { .. })
    }

    /// Fail with `Forbidden` unless this is a super admin
    pub fn require_super(&self, action: &str) -> Result<()> {
        if self.is_super() {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "{} requires super_admin, caller is {}",
                action,
                self.role()
            )))
        }
    }

    /// Whether an entity resolved to `country` is visible
    pub fn can_see(&self, country: Option<&str>) -> bool {
        match self {
            AdminIdentity::SuperAdmin { .. } => true,
            AdminIdentity::MiddleAdmin { countries, .. } => country
                .and_then(normalize_country)
                .map(|c| countries.contains(&c))
                .unwrap_or(false),
            AdminIdentity::NormalAdmin { .. } => true,
        }
    }

    /// Keep only the entities this admin may see
    pub fn filter<T, F, C>(&self, items: Vec<T>, country_of: F) -> Vec<T>
    where
        F: Fn(&T) -> Option<C>,
        C: AsRef<str>,
    {
        match self {
            AdminIdentity::SuperAdmin { .. } | AdminIdentity::NormalAdmin { .. } => items,
            AdminIdentity::MiddleAdmin { .. } => items
                .into_iter()
                .filter(|item| {
                    let country = country_of(item);
                    self.can_see(country.as_ref().map(|c| c.as_ref()))
                })
                .collect(),
        }
    }
}
