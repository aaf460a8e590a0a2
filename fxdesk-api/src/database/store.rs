//! Persistence gateway
//!
//! Every unit of work opens a [`StoreTransaction`], reads and writes through
//! it, and commits. Dropping a transaction without committing discards all of
//! its writes. Reads ending in `_for_update` lock the row until the
//! transaction ends, so concurrent settlements of the same deposit or the same
//! wallet run one after the other.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use fxdesk::{IbCbWallet, WalletType};

use crate::error::ServiceResult;
use crate::models::{
    ActivityLog, AdminCountryAssignment, AdminUser, Deposit, KycDocument, Notification, TradingAccount, User,
    WalletEntry, Withdrawal,
};

/// Entry point to a storage backend
#[async_trait]
pub trait BrokerageStore: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> ServiceResult<Box<dyn StoreTransaction>>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> ServiceResult<()>;
}

/// Typed accessors available inside a unit of work
#[async_trait]
pub trait StoreTransaction: Send {
    // Users

    /// Fails with `Conflict` when the email or referral code is taken
    async fn insert_user(&mut self, user: &User) -> ServiceResult<()>;
    async fn get_user(&mut self, id: Uuid) -> ServiceResult<Option<User>>;
    async fn get_user_for_update(&mut self, id: Uuid) -> ServiceResult<Option<User>>;
    /// Case-insensitive lookup
    async fn find_user_by_email(&mut self, email: &str) -> ServiceResult<Option<User>>;
    /// Exact lookup
    async fn find_user_by_referral_code(&mut self, code: &str) -> ServiceResult<Option<User>>;
    async fn update_user(&mut self, user: &User) -> ServiceResult<()>;
    async fn list_users(&mut self) -> ServiceResult<Vec<User>>;

    // Admins
    async fn insert_admin(&mut self, admin: &AdminUser) -> ServiceResult<()>;
    async fn get_admin(&mut self, id: Uuid) -> ServiceResult<Option<AdminUser>>;
    async fn update_admin(&mut self, admin: &AdminUser) -> ServiceResult<()>;
    async fn list_admins(&mut self) -> ServiceResult<Vec<AdminUser>>;
    async fn admin_countries(&mut self, admin_id: Uuid) -> ServiceResult<Vec<AdminCountryAssignment>>;
    /// Returns `false` when the country was already assigned
    async fn assign_country(&mut self, assignment: &AdminCountryAssignment) -> ServiceResult<bool>;
    /// Returns `false` when there was nothing to remove
    async fn remove_country(&mut self, admin_id: Uuid, country: &str) -> ServiceResult<bool>;

    // Trading accounts
    async fn insert_trading_account(&mut self, account: &TradingAccount) -> ServiceResult<()>;
    async fn get_trading_account(&mut self, id: Uuid) -> ServiceResult<Option<TradingAccount>>;
    async fn list_trading_accounts(&mut self) -> ServiceResult<Vec<TradingAccount>>;

    // Deposits
    async fn insert_deposit(&mut self, deposit: &Deposit) -> ServiceResult<()>;
    async fn get_deposit_for_update(&mut self, id: Uuid) -> ServiceResult<Option<Deposit>>;
    async fn find_deposit_by_invoice_for_update(&mut self, invoice_id: &str) -> ServiceResult<Option<Deposit>>;
    async fn update_deposit(&mut self, deposit: &Deposit) -> ServiceResult<()>;
    async fn list_deposits(&mut self) -> ServiceResult<Vec<Deposit>>;

    // Withdrawals and KYC documents
    async fn insert_withdrawal(&mut self, withdrawal: &Withdrawal) -> ServiceResult<()>;
    async fn list_withdrawals(&mut self) -> ServiceResult<Vec<Withdrawal>>;
    async fn insert_document(&mut self, document: &KycDocument) -> ServiceResult<()>;
    async fn list_documents(&mut self) -> ServiceResult<Vec<KycDocument>>;

    // Commission wallets

    /// Get the wallet, creating it with `default_rate` if absent, and lock it
    async fn ensure_wallet(
        &mut self,
        user_id: Uuid,
        wallet_type: WalletType,
        default_rate: Decimal,
    ) -> ServiceResult<IbCbWallet>;
    async fn get_wallet(&mut self, user_id: Uuid, wallet_type: WalletType) -> ServiceResult<Option<IbCbWallet>>;
    async fn get_wallet_for_update(
        &mut self,
        user_id: Uuid,
        wallet_type: WalletType,
    ) -> ServiceResult<Option<IbCbWallet>>;
    async fn update_wallet(&mut self, wallet: &IbCbWallet) -> ServiceResult<()>;
    async fn list_wallets(&mut self) -> ServiceResult<Vec<IbCbWallet>>;

    // Wallet ledger
    async fn find_commission_entry(&mut self, deposit_id: Uuid) -> ServiceResult<Option<WalletEntry>>;
    /// Fails with `Conflict` when a commission entry already exists for the deposit
    async fn insert_wallet_entry(&mut self, entry: &WalletEntry) -> ServiceResult<()>;
    async fn list_wallet_entries(&mut self, wallet_id: Uuid) -> ServiceResult<Vec<WalletEntry>>;

    // Activity log

    /// A failure here must leave the rest of the transaction usable
    async fn append_activity(&mut self, entry: &ActivityLog) -> ServiceResult<()>;
    /// Newest first, optionally restricted to one admin
    async fn list_activity(&mut self, admin_id: Option<Uuid>, limit: usize) -> ServiceResult<Vec<ActivityLog>>;

    // Notifications
    async fn insert_notification(&mut self, notification: &Notification) -> ServiceResult<()>;
    /// Newest first
    async fn list_notifications(&mut self, user_id: Uuid) -> ServiceResult<Vec<Notification>>;

    async fn commit(self: Box<Self>) -> ServiceResult<()>;
}
