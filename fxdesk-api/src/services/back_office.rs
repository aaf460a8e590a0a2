//! Role-scoped admin listings and dashboard figures
//!
//! Every collection returned here has been passed through
//! [`AdminIdentity::filter`]. Entities that carry no country of their own are
//! placed in the country of the user that owns them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use fxdesk::{AdminIdentity, IbCbWallet, ReferralStatus, WalletType};

use crate::database::{BrokerageStore, StoreTransaction};
use crate::error::ServiceResult;
use crate::models::{Deposit, DepositStatus, KycDocument, ReviewStatus, TradingAccount, User, Withdrawal};
use crate::services::load_visible_user;

/// Owner country of every user, for entities scoped through their owner
struct OwnerCountries(HashMap<Uuid, Option<String>>);

impl OwnerCountries {
    async fn load(tx: &mut dyn StoreTransaction) -> ServiceResult<Self> {
        let users = tx.list_users().await?;
        Ok(Self(users.into_iter().map(|u| (u.id, u.country)).collect()))
    }

    fn of(&self, user_id: Uuid) -> Option<&str> {
        self.0.get(&user_id).and_then(|c| c.as_deref())
    }
}

/// Full view of one client
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub referral_status: &'static str,
    pub trading_accounts: Vec<TradingAccount>,
    pub ib_wallet: Option<IbCbWallet>,
    /// Users this client referred, restricted to what the admin may see
    pub referred_users: Vec<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferralCounts {
    pub none: usize,
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Dashboard figures over the admin's visible data
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeskStats {
    pub users: usize,
    pub referrals: ReferralCounts,
    pub trading_accounts: usize,
    pub deposits_by_status: BTreeMap<String, usize>,
    pub credited_deposit_total: Decimal,
    pub pending_withdrawals: usize,
    pub pending_documents: usize,
    pub ib_wallets: usize,
    pub total_commission: Decimal,
    pub outstanding_commission: Decimal,
}

/// Optional narrowing of the deposit listing
#[derive(Debug, Clone, Default)]
pub struct DepositFilter {
    pub status: Option<DepositStatus>,
    pub user_id: Option<Uuid>,
}

pub struct BackOfficeServiceImpl {
    store: Arc<dyn BrokerageStore>,
}

impl BackOfficeServiceImpl {
    pub fn new(store: Arc<dyn BrokerageStore>) -> Self {
        Self { store }
    }

    pub async fn list_users(&self, admin: &AdminIdentity) -> ServiceResult<Vec<User>> {
        let mut tx = self.store.begin().await?;
        let users = tx.list_users().await?;
        Ok(admin.filter(users, |u| u.country.clone()))
    }

    pub async fn get_user(&self, admin: &AdminIdentity, user_id: Uuid) -> ServiceResult<UserDetail> {
        let mut tx = self.store.begin().await?;
        let user = load_visible_user(tx.as_mut(), admin, user_id, false).await?;

        let trading_accounts = tx
            .list_trading_accounts()
            .await?
            .into_iter()
            .filter(|a| a.user_id == user.id)
            .collect();
        let ib_wallet = tx.get_wallet(user.id, WalletType::Ib).await?;
        let referred_users = tx
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.referred_by() == Some(user.id))
            .collect();

        Ok(UserDetail {
            referral_status: user.referral_status(),
            user,
            trading_accounts,
            ib_wallet,
            referred_users: admin.filter(referred_users, |u: &User| u.country.clone()),
        })
    }

    pub async fn list_trading_accounts(&self, admin: &AdminIdentity) -> ServiceResult<Vec<TradingAccount>> {
        let mut tx = self.store.begin().await?;
        let owners = OwnerCountries::load(tx.as_mut()).await?;
        let accounts = tx.list_trading_accounts().await?;
        Ok(admin.filter(accounts, |a| owners.of(a.user_id)))
    }

    pub async fn list_deposits(&self, admin: &AdminIdentity, filter: DepositFilter) -> ServiceResult<Vec<Deposit>> {
        let mut tx = self.store.begin().await?;
        let owners = OwnerCountries::load(tx.as_mut()).await?;
        let deposits = tx
            .list_deposits()
            .await?
            .into_iter()
            .filter(|d| filter.status.map_or(true, |s| d.status == s))
            .filter(|d| filter.user_id.map_or(true, |u| d.user_id == u))
            .collect();
        Ok(admin.filter(deposits, |d: &Deposit| owners.of(d.user_id)))
    }

    pub async fn list_withdrawals(&self, admin: &AdminIdentity) -> ServiceResult<Vec<Withdrawal>> {
        let mut tx = self.store.begin().await?;
        let owners = OwnerCountries::load(tx.as_mut()).await?;
        let withdrawals = tx.list_withdrawals().await?;
        Ok(admin.filter(withdrawals, |w| owners.of(w.user_id)))
    }

    pub async fn list_documents(&self, admin: &AdminIdentity) -> ServiceResult<Vec<KycDocument>> {
        let mut tx = self.store.begin().await?;
        let owners = OwnerCountries::load(tx.as_mut()).await?;
        let documents = tx.list_documents().await?;
        Ok(admin.filter(documents, |d| owners.of(d.user_id)))
    }

    pub async fn list_wallets(&self, admin: &AdminIdentity) -> ServiceResult<Vec<IbCbWallet>> {
        let mut tx = self.store.begin().await?;
        let owners = OwnerCountries::load(tx.as_mut()).await?;
        let wallets = tx.list_wallets().await?;
        Ok(admin.filter(wallets, |w| owners.of(w.user_id)))
    }

    /// Aggregate figures, computed only over what the admin can see
    pub async fn stats(&self, admin: &AdminIdentity) -> ServiceResult<DeskStats> {
        let mut tx = self.store.begin().await?;
        let all_users = tx.list_users().await?;
        let owners = OwnerCountries(all_users.iter().map(|u| (u.id, u.country.clone())).collect());

        let users = admin.filter(all_users, |u| u.country.clone());
        let accounts = admin.filter(tx.list_trading_accounts().await?, |a| owners.of(a.user_id));
        let deposits = admin.filter(tx.list_deposits().await?, |d| owners.of(d.user_id));
        let withdrawals = admin.filter(tx.list_withdrawals().await?, |w| owners.of(w.user_id));
        let documents = admin.filter(tx.list_documents().await?, |d| owners.of(d.user_id));
        let wallets = admin.filter(tx.list_wallets().await?, |w| owners.of(w.user_id));

        let mut stats = DeskStats {
            users: users.len(),
            trading_accounts: accounts.len(),
            ..DeskStats::default()
        };

        for user in &users {
            match user.referral.as_ref().map(|l| l.status) {
                None => stats.referrals.none += 1,
                Some(ReferralStatus::Pending) => stats.referrals.pending += 1,
                Some(ReferralStatus::Accepted) => stats.referrals.accepted += 1,
                Some(ReferralStatus::Rejected) => stats.referrals.rejected += 1,
            }
        }

        for status in DepositStatus::ALL {
            stats.deposits_by_status.insert(status.as_str().to_string(), 0);
        }
        for deposit in &deposits {
            *stats
                .deposits_by_status
                .entry(deposit.status.as_str().to_string())
                .or_default() += 1;
            if deposit.status.is_funds_credited() {
                stats.credited_deposit_total += deposit.amount;
            }
        }

        stats.pending_withdrawals = withdrawals.iter().filter(|w| w.status == ReviewStatus::Pending).count();
        stats.pending_documents = documents.iter().filter(|d| d.status == ReviewStatus::Pending).count();

        let ib_wallets: Vec<&IbCbWallet> = wallets.iter().filter(|w| w.wallet_type == WalletType::Ib).collect();
        stats.ib_wallets = ib_wallets.len();
        stats.total_commission = ib_wallets.iter().map(|w| w.total_commission).sum();
        stats.outstanding_commission = ib_wallets.iter().map(|w| w.balance).sum();

        Ok(stats)
    }
}
