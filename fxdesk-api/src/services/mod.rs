//! Back-office and client services

pub mod notifications;
pub mod settlement;
pub mod client;
pub mod referral;
pub mod commission;
pub mod deposits;
pub mod payments;
pub mod back_office;
pub mod admins;
pub mod activity;

#[cfg(test)]
pub mod test_support;
#[cfg(test)]
pub mod deposits_test;
#[cfg(test)]
pub mod back_office_test;
#[cfg(test)]
pub mod admins_test;
#[cfg(test)]
pub mod client_test;

use uuid::Uuid;

use fxdesk::AdminIdentity;

use crate::database::StoreTransaction;
use crate::error::{ServiceError, ServiceResult};
use crate::models::User;

/// Load a user the admin is allowed to see.
///
/// Users outside the admin's scope are reported as missing.
pub(crate) async fn load_visible_user(
    tx: &mut dyn StoreTransaction,
    admin: &AdminIdentity,
    user_id: Uuid,
    for_update: bool,
) -> ServiceResult<User> {
    let user = if for_update {
        tx.get_user_for_update(user_id).await?
    } else {
        tx.get_user(user_id).await?
    };

    user.filter(|u| admin.can_see(u.country.as_deref()))
        .ok_or_else(|| ServiceError::not_found("User", user_id))
}
