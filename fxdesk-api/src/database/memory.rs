//! In-memory storage backend
//!
//! Used when no `DATABASE_URL` is configured and throughout the test suite.
//! One transaction runs at a time: `begin` takes the table lock and works on a
//! copy, which replaces the shared tables only on commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use fxdesk::access::normalize_country;
use fxdesk::{IbCbWallet, WalletType};

use crate::database::store::{BrokerageStore, StoreTransaction};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    ActivityLog, AdminCountryAssignment, AdminUser, Deposit, KycDocument, Notification, TradingAccount, User,
    WalletEntry, WalletEntryKind, Withdrawal,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    admins: HashMap<Uuid, AdminUser>,
    admin_countries: Vec<AdminCountryAssignment>,
    trading_accounts: HashMap<Uuid, TradingAccount>,
    deposits: HashMap<Uuid, Deposit>,
    withdrawals: Vec<Withdrawal>,
    documents: Vec<KycDocument>,
    wallets: HashMap<Uuid, IbCbWallet>,
    wallet_entries: Vec<WalletEntry>,
    activity: Vec<ActivityLog>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn wallet_id(&self, user_id: Uuid, wallet_type: WalletType) -> Option<Uuid> {
        self.wallets
            .values()
            .find(|w| w.user_id == user_id && w.wallet_type == wallet_type)
            .map(|w| w.id)
    }
}

/// Process-local store
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BrokerageStore for InMemoryStore {
    async fn begin(&self) -> ServiceResult<Box<dyn StoreTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }

    async fn health_check(&self) -> ServiceResult<()> {
        Ok(())
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

fn sorted_by_creation<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn insert_user(&mut self, user: &User) -> ServiceResult<()> {
        for existing in self.working.users.values() {
            if existing.email.eq_ignore_ascii_case(&user.email) {
                return Err(ServiceError::Conflict(format!("Email {} is already registered", user.email)));
            }
            if existing.referral_code == user.referral_code {
                return Err(ServiceError::Conflict(format!(
                    "Referral code {} is already taken",
                    user.referral_code
                )));
            }
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&mut self, id: Uuid) -> ServiceResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn get_user_for_update(&mut self, id: Uuid) -> ServiceResult<Option<User>> {
        self.get_user(id).await
    }

    async fn find_user_by_email(&mut self, email: &str) -> ServiceResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_referral_code(&mut self, code: &str) -> ServiceResult<Option<User>> {
        Ok(self.working.users.values().find(|u| u.referral_code == code).cloned())
    }

    async fn update_user(&mut self, user: &User) -> ServiceResult<()> {
        match self.working.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(ServiceError::not_found("User", user.id)),
        }
    }

    async fn list_users(&mut self) -> ServiceResult<Vec<User>> {
        let users = self.working.users.values().cloned().collect();
        Ok(sorted_by_creation(users, |u: &User| u.created_at))
    }

    async fn insert_admin(&mut self, admin: &AdminUser) -> ServiceResult<()> {
        if self.working.admins.values().any(|a| a.email.eq_ignore_ascii_case(&admin.email)) {
            return Err(ServiceError::Conflict(format!("Admin {} already exists", admin.email)));
        }
        self.working.admins.insert(admin.id, admin.clone());
        Ok(())
    }

    async fn get_admin(&mut self, id: Uuid) -> ServiceResult<Option<AdminUser>> {
        Ok(self.working.admins.get(&id).cloned())
    }

    async fn update_admin(&mut self, admin: &AdminUser) -> ServiceResult<()> {
        match self.working.admins.get_mut(&admin.id) {
            Some(existing) => {
                *existing = admin.clone();
                Ok(())
            }
            None => Err(ServiceError::not_found("Admin", admin.id)),
        }
    }

    async fn list_admins(&mut self) -> ServiceResult<Vec<AdminUser>> {
        let admins = self.working.admins.values().cloned().collect();
        Ok(sorted_by_creation(admins, |a: &AdminUser| a.created_at))
    }

    async fn admin_countries(&mut self, admin_id: Uuid) -> ServiceResult<Vec<AdminCountryAssignment>> {
        Ok(self
            .working
            .admin_countries
            .iter()
            .filter(|a| a.admin_id == admin_id)
            .cloned()
            .collect())
    }

    async fn assign_country(&mut self, assignment: &AdminCountryAssignment) -> ServiceResult<bool> {
        let wanted = normalize_country(&assignment.country);
        let exists = self
            .working
            .admin_countries
            .iter()
            .any(|a| a.admin_id == assignment.admin_id && normalize_country(&a.country) == wanted);
        if exists {
            return Ok(false);
        }
        self.working.admin_countries.push(assignment.clone());
        Ok(true)
    }

    async fn remove_country(&mut self, admin_id: Uuid, country: &str) -> ServiceResult<bool> {
        let wanted = normalize_country(country);
        let before = self.working.admin_countries.len();
        self.working
            .admin_countries
            .retain(|a| !(a.admin_id == admin_id && normalize_country(&a.country) == wanted));
        Ok(self.working.admin_countries.len() != before)
    }

    async fn insert_trading_account(&mut self, account: &TradingAccount) -> ServiceResult<()> {
        if self.working.trading_accounts.values().any(|a| a.login == account.login) {
            return Err(ServiceError::Conflict(format!("Login {} is already in use", account.login)));
        }
        self.working.trading_accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_trading_account(&mut self, id: Uuid) -> ServiceResult<Option<TradingAccount>> {
        Ok(self.working.trading_accounts.get(&id).cloned())
    }

    async fn list_trading_accounts(&mut self) -> ServiceResult<Vec<TradingAccount>> {
        let accounts = self.working.trading_accounts.values().cloned().collect();
        Ok(sorted_by_creation(accounts, |a: &TradingAccount| a.created_at))
    }

    async fn insert_deposit(&mut self, deposit: &Deposit) -> ServiceResult<()> {
        if let Some(invoice) = &deposit.invoice_id {
            if self
                .working
                .deposits
                .values()
                .any(|d| d.invoice_id.as_deref() == Some(invoice.as_str()))
            {
                return Err(ServiceError::Conflict(format!("Invoice {} is already linked", invoice)));
            }
        }
        self.working.deposits.insert(deposit.id, deposit.clone());
        Ok(())
    }

    async fn get_deposit_for_update(&mut self, id: Uuid) -> ServiceResult<Option<Deposit>> {
        Ok(self.working.deposits.get(&id).cloned())
    }

    async fn find_deposit_by_invoice_for_update(&mut self, invoice_id: &str) -> ServiceResult<Option<Deposit>> {
        Ok(self
            .working
            .deposits
            .values()
            .find(|d| d.invoice_id.as_deref() == Some(invoice_id))
            .cloned())
    }

    async fn update_deposit(&mut self, deposit: &Deposit) -> ServiceResult<()> {
        match self.working.deposits.get_mut(&deposit.id) {
            Some(existing) => {
                *existing = deposit.clone();
                Ok(())
            }
            None => Err(ServiceError::not_found("Deposit", deposit.id)),
        }
    }

    async fn list_deposits(&mut self) -> ServiceResult<Vec<Deposit>> {
        let deposits = self.working.deposits.values().cloned().collect();
        Ok(sorted_by_creation(deposits, |d: &Deposit| d.created_at))
    }

    async fn insert_withdrawal(&mut self, withdrawal: &Withdrawal) -> ServiceResult<()> {
        self.working.withdrawals.push(withdrawal.clone());
        Ok(())
    }

    async fn list_withdrawals(&mut self) -> ServiceResult<Vec<Withdrawal>> {
        Ok(self.working.withdrawals.clone())
    }

    async fn insert_document(&mut self, document: &KycDocument) -> ServiceResult<()> {
        self.working.documents.push(document.clone());
        Ok(())
    }

    async fn list_documents(&mut self) -> ServiceResult<Vec<KycDocument>> {
        Ok(self.working.documents.clone())
    }

    async fn ensure_wallet(
        &mut self,
        user_id: Uuid,
        wallet_type: WalletType,
        default_rate: Decimal,
    ) -> ServiceResult<IbCbWallet> {
        if let Some(id) = self.working.wallet_id(user_id, wallet_type) {
            if let Some(wallet) = self.working.wallets.get(&id) {
                return Ok(wallet.clone());
            }
        }
        let wallet = IbCbWallet::new(user_id, wallet_type, default_rate, chrono::Utc::now());
        self.working.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn get_wallet(&mut self, user_id: Uuid, wallet_type: WalletType) -> ServiceResult<Option<IbCbWallet>> {
        Ok(self
            .working
            .wallet_id(user_id, wallet_type)
            .and_then(|id| self.working.wallets.get(&id))
            .cloned())
    }

    async fn get_wallet_for_update(
        &mut self,
        user_id: Uuid,
        wallet_type: WalletType,
    ) -> ServiceResult<Option<IbCbWallet>> {
        self.get_wallet(user_id, wallet_type).await
    }

    async fn update_wallet(&mut self, wallet: &IbCbWallet) -> ServiceResult<()> {
        match self.working.wallets.get_mut(&wallet.id) {
            Some(existing) => {
                *existing = wallet.clone();
                Ok(())
            }
            None => Err(ServiceError::not_found("Wallet", wallet.id)),
        }
    }

    async fn list_wallets(&mut self) -> ServiceResult<Vec<IbCbWallet>> {
        let wallets = self.working.wallets.values().cloned().collect();
        Ok(sorted_by_creation(wallets, |w: &IbCbWallet| w.created_at))
    }

    async fn find_commission_entry(&mut self, deposit_id: Uuid) -> ServiceResult<Option<WalletEntry>> {
        Ok(self
            .working
            .wallet_entries
            .iter()
            .find(|e| e.kind == WalletEntryKind::Commission && e.deposit_id == Some(deposit_id))
            .cloned())
    }

    async fn insert_wallet_entry(&mut self, entry: &WalletEntry) -> ServiceResult<()> {
        if let Some(deposit_id) = entry.deposit_id {
            if self.working.wallet_entries.iter().any(|e| e.deposit_id == Some(deposit_id)) {
                return Err(ServiceError::Conflict(format!(
                    "Deposit {} already has a commission entry",
                    deposit_id
                )));
            }
        }
        self.working.wallet_entries.push(entry.clone());
        Ok(())
    }

    async fn list_wallet_entries(&mut self, wallet_id: Uuid) -> ServiceResult<Vec<WalletEntry>> {
        Ok(self
            .working
            .wallet_entries
            .iter()
            .filter(|e| e.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn append_activity(&mut self, entry: &ActivityLog) -> ServiceResult<()> {
        self.working.activity.push(entry.clone());
        Ok(())
    }

    async fn list_activity(&mut self, admin_id: Option<Uuid>, limit: usize) -> ServiceResult<Vec<ActivityLog>> {
        let mut entries: Vec<ActivityLog> = self
            .working
            .activity
            .iter()
            .rev()
            .filter(|e| admin_id.is_none() || e.admin_id == admin_id)
            .cloned()
            .collect();
        // stable, so equal timestamps stay newest-first
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn insert_notification(&mut self, notification: &Notification) -> ServiceResult<()> {
        self.working.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&mut self, user_id: Uuid) -> ServiceResult<Vec<Notification>> {
        Ok(self
            .working
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> ServiceResult<()> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxdesk::money::DEFAULT_COMMISSION_RATE;

    fn user(email: &str, code: &str) -> User {
        User::new(email, "Test User", Some("Kenya".into()), None, code, None)
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = InMemoryStore::new();
        let alice = user("alice@example.com", "REFAAAAAA");

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&alice).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.get_user(alice.id).await.unwrap().is_none());
        tx.insert_user(&alice).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.get_user(alice.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn email_uniqueness_ignores_case() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&user("bob@example.com", "REFBBBBBB")).await.unwrap();
        let err = tx.insert_user(&user("BOB@example.com", "REFCCCCCC")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(tx.find_user_by_email("Bob@Example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ensure_wallet_is_get_or_create() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let mut tx = store.begin().await.unwrap();
        let first = tx.ensure_wallet(owner, WalletType::Ib, DEFAULT_COMMISSION_RATE).await.unwrap();
        let second = tx.ensure_wallet(owner, WalletType::Ib, Decimal::ONE).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.commission_rate, DEFAULT_COMMISSION_RATE);
        assert_eq!(tx.list_wallets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commission_entries_are_unique_per_deposit() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let wallet = tx
            .ensure_wallet(Uuid::new_v4(), WalletType::Ib, DEFAULT_COMMISSION_RATE)
            .await
            .unwrap();
        let deposit_id = Uuid::new_v4();
        tx.insert_wallet_entry(&WalletEntry::commission(&wallet, deposit_id, Decimal::TEN, None))
            .await
            .unwrap();
        let err = tx
            .insert_wallet_entry(&WalletEntry::commission(&wallet, deposit_id, Decimal::TEN, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn country_assignments_are_deduplicated() {
        let store = InMemoryStore::new();
        let admin_id = Uuid::new_v4();
        let mut tx = store.begin().await.unwrap();
        let assign = |country: &str| AdminCountryAssignment {
            admin_id,
            country: country.to_string(),
            created_at: chrono::Utc::now(),
        };
        assert!(tx.assign_country(&assign("Kenya")).await.unwrap());
        assert!(!tx.assign_country(&assign(" kenya ")).await.unwrap());
        assert_eq!(tx.admin_countries(admin_id).await.unwrap().len(), 1);
        assert!(tx.remove_country(admin_id, "KENYA").await.unwrap());
        assert!(!tx.remove_country(admin_id, "Kenya").await.unwrap());
    }
}
