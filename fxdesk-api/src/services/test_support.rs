//! Shared fixtures for the service tests

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use fxdesk::{AdminIdentity, AdminRole, ReferralLink};

use crate::config::AppConfig;
use crate::database::{BrokerageStore, InMemoryStore};
use crate::models::{Deposit, User};
use crate::state::AppState;

pub fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

pub fn super_admin() -> AdminIdentity {
    AdminIdentity::new(Uuid::new_v4(), AdminRole::SuperAdmin, Vec::<String>::new())
}

pub fn normal_admin() -> AdminIdentity {
    AdminIdentity::new(Uuid::new_v4(), AdminRole::NormalAdmin, Vec::<String>::new())
}

pub fn middle_admin(countries: &[&str]) -> AdminIdentity {
    AdminIdentity::new(Uuid::new_v4(), AdminRole::MiddleAdmin, countries.iter().copied())
}

/// In-memory desk with every service wired as in production
pub struct TestDesk {
    pub state: Arc<AppState>,
}

impl TestDesk {
    pub fn new() -> Self {
        let store: Arc<dyn BrokerageStore> = Arc::new(InMemoryStore::new());
        let state = AppState::new(AppConfig::in_memory(), store).unwrap();
        Self { state: Arc::new(state) }
    }

    pub fn store(&self) -> Arc<dyn BrokerageStore> {
        self.state.store.clone()
    }

    pub async fn user(&self, email: &str, country: &str, code: &str, referral: Option<ReferralLink>) -> User {
        let user = User::new(email, email, Some(country.to_string()), None, code, referral);
        let mut tx = self.state.store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.commit().await.unwrap();
        user
    }

    /// Referrer plus a client it referred, still pending
    pub async fn referral_pair(&self, country: &str) -> (User, User) {
        let referrer = self
            .user(&format!("ib-{}@desk.test", Uuid::new_v4()), country, &format!("REF{}", &Uuid::new_v4().simple().to_string()[..6].to_uppercase()), None)
            .await;
        let client = self
            .user(
                &format!("client-{}@desk.test", Uuid::new_v4()),
                country,
                &format!("REF{}", &Uuid::new_v4().simple().to_string()[..6].to_uppercase()),
                Some(ReferralLink::pending(referrer.id)),
            )
            .await;
        (referrer, client)
    }

    pub async fn deposit(&self, user_id: Uuid, amount: &str) -> Deposit {
        let deposit = Deposit::new(user_id, None, dec(amount), "bank_transfer", None).unwrap();
        let mut tx = self.state.store.begin().await.unwrap();
        tx.insert_deposit(&deposit).await.unwrap();
        tx.commit().await.unwrap();
        deposit
    }
}
