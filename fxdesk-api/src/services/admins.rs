//! Admin account management. Every operation here is reserved to super admins.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use fxdesk::access::normalize_country;
use fxdesk::{AdminIdentity, AdminRole};

use crate::database::BrokerageStore;
use crate::error::{ServiceError, ServiceResult};
use crate::middleware::{ActivityLogger, AuditAction};
use crate::models::{AdminCountryAssignment, AdminUser};

/// Admin together with its country scope
#[derive(Debug, Clone, Serialize)]
pub struct AdminView {
    #[serde(flatten)]
    pub admin: AdminUser,
    pub countries: Vec<String>,
}

pub(crate) fn validate_email(email: &str) -> ServiceResult<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    };
    if valid {
        Ok(email.to_string())
    } else {
        Err(ServiceError::validation(format!("'{}' is not a valid email address", email)))
    }
}

fn canonical_country(country: &str) -> ServiceResult<String> {
    normalize_country(country)
        .map(|_| country.trim().to_string())
        .ok_or_else(|| ServiceError::validation("Country must not be blank"))
}

pub struct AdminServiceImpl {
    store: Arc<dyn BrokerageStore>,
    audit: ActivityLogger,
}

impl AdminServiceImpl {
    pub fn new(store: Arc<dyn BrokerageStore>, audit: ActivityLogger) -> Self {
        Self { store, audit }
    }

    #[instrument(skip(self, actor, countries), fields(actor_id = %actor.id()))]
    pub async fn create_admin(
        &self,
        actor: &AdminIdentity,
        email: &str,
        name: &str,
        role: AdminRole,
        countries: Vec<String>,
    ) -> ServiceResult<AdminView> {
        actor.require_super("Admin creation")?;
        let email = validate_email(email)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("Admin name must not be blank"));
        }
        let countries = countries
            .iter()
            .map(|c| canonical_country(c))
            .collect::<ServiceResult<Vec<_>>>()?;

        let admin = AdminUser::new(email, name, role, Some(actor.id()));
        let mut tx = self.store.begin().await?;
        tx.insert_admin(&admin).await?;
        for country in &countries {
            tx.assign_country(&AdminCountryAssignment {
                admin_id: admin.id,
                country: country.clone(),
                created_at: admin.created_at,
            })
            .await?;
        }

        self.audit
            .log(
                tx.as_mut(),
                Some(actor.id()),
                AuditAction::AdminCreated,
                "admin_user",
                Some(admin.id),
                Some(format!("{} as {}", admin.email, admin.role)),
            )
            .await;

        let countries = tx.admin_countries(admin.id).await?.into_iter().map(|a| a.country).collect();
        tx.commit().await?;
        info!(admin_id = %admin.id, role = %admin.role, "Admin created");

        Ok(AdminView { admin, countries })
    }

    /// Soft-disable an admin; disabled admins can no longer authenticate
    #[instrument(skip(self, actor), fields(actor_id = %actor.id()))]
    pub async fn disable_admin(&self, actor: &AdminIdentity, admin_id: Uuid) -> ServiceResult<AdminUser> {
        actor.require_super("Admin disable")?;
        if actor.id() == admin_id {
            return Err(ServiceError::validation("Admins cannot disable themselves"));
        }

        let mut tx = self.store.begin().await?;
        let mut admin = tx
            .get_admin(admin_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Admin", admin_id))?;

        if admin.enabled {
            admin.enabled = false;
            tx.update_admin(&admin).await?;
            self.audit
                .log(
                    tx.as_mut(),
                    Some(actor.id()),
                    AuditAction::AdminDisabled,
                    "admin_user",
                    Some(admin.id),
                    Some(admin.email.clone()),
                )
                .await;
            tx.commit().await?;
            info!(admin_id = %admin.id, "Admin disabled");
        }

        Ok(admin)
    }

    /// Add a country to an admin's scope. Assigning it twice is a no-op.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id()))]
    pub async fn assign_country(
        &self,
        actor: &AdminIdentity,
        admin_id: Uuid,
        country: &str,
    ) -> ServiceResult<AdminView> {
        actor.require_super("Country assignment")?;
        let country = canonical_country(country)?;

        let mut tx = self.store.begin().await?;
        let admin = tx
            .get_admin(admin_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Admin", admin_id))?;
        if admin.role != AdminRole::MiddleAdmin {
            warn!(admin_id = %admin_id, role = %admin.role, "Country assigned to an admin that is not scoped by country");
        }

        let inserted = tx
            .assign_country(&AdminCountryAssignment {
                admin_id,
                country: country.clone(),
                created_at: Utc::now(),
            })
            .await?;
        if inserted {
            self.audit
                .log(
                    tx.as_mut(),
                    Some(actor.id()),
                    AuditAction::CountryAssigned,
                    "admin_user",
                    Some(admin_id),
                    Some(country),
                )
                .await;
        }

        let countries = tx.admin_countries(admin_id).await?.into_iter().map(|a| a.country).collect();
        tx.commit().await?;
        Ok(AdminView { admin, countries })
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id()))]
    pub async fn remove_country(
        &self,
        actor: &AdminIdentity,
        admin_id: Uuid,
        country: &str,
    ) -> ServiceResult<AdminView> {
        actor.require_super("Country removal")?;
        let country = canonical_country(country)?;

        let mut tx = self.store.begin().await?;
        let admin = tx
            .get_admin(admin_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Admin", admin_id))?;

        if !tx.remove_country(admin_id, &country).await? {
            return Err(ServiceError::NotFound(format!("{} is not assigned to admin {}", country, admin_id)));
        }
        self.audit
            .log(
                tx.as_mut(),
                Some(actor.id()),
                AuditAction::CountryRemoved,
                "admin_user",
                Some(admin_id),
                Some(country),
            )
            .await;

        let countries = tx.admin_countries(admin_id).await?.into_iter().map(|a| a.country).collect();
        tx.commit().await?;
        Ok(AdminView { admin, countries })
    }

    pub async fn list_admins(&self, actor: &AdminIdentity) -> ServiceResult<Vec<AdminView>> {
        actor.require_super("Admin listing")?;
        let mut tx = self.store.begin().await?;
        let mut views = Vec::new();
        for admin in tx.list_admins().await? {
            let countries = tx.admin_countries(admin.id).await?.into_iter().map(|a| a.country).collect();
            views.push(AdminView { admin, countries });
        }
        Ok(views)
    }

    /// Create the first super admin when the store has no admins yet
    pub async fn bootstrap_super_admin(&self, email: &str) -> ServiceResult<Option<AdminUser>> {
        let email = validate_email(email)?;
        let mut tx = self.store.begin().await?;
        if !tx.list_admins().await?.is_empty() {
            return Ok(None);
        }

        let admin = AdminUser::new(email, "Bootstrap super admin", AdminRole::SuperAdmin, None);
        tx.insert_admin(&admin).await?;
        self.audit
            .log(
                tx.as_mut(),
                None,
                AuditAction::AdminCreated,
                "admin_user",
                Some(admin.id),
                Some(format!("{} bootstrapped", admin.email)),
            )
            .await;
        tx.commit().await?;

        info!(admin_id = %admin.id, "Bootstrapped super admin");
        Ok(Some(admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_is_checked() {
        assert_eq!(validate_email("  a@b.co ").unwrap(), "a@b.co");
        for bad in ["", "no-at", "@b.co", "a@b", "a b@c.co", "a@.co", "a@b@c.co"] {
            assert!(validate_email(bad).is_err(), "{bad} should be rejected");
        }
    }
}
