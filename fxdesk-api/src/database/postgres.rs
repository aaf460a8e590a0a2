//! PostgreSQL storage backend

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Acquire, PgPool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use fxdesk::{IbCbWallet, ReferralLink, WalletType};

use crate::database::store::{BrokerageStore, StoreTransaction};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    ActivityLog, AdminCountryAssignment, AdminUser, Deposit, KycDocument, Notification, TradingAccount, User,
    WalletEntry, Withdrawal,
};

const USER_COLUMNS: &str = "id, email, full_name, country, city, referral_code, referred_by, referral_status, \
     referral_decided_by, referral_decided_at, referral_rejection_reason, created_at";
const ADMIN_COLUMNS: &str = "id, email, name, role, enabled, created_by, created_at";
const ACCOUNT_COLUMNS: &str = "id, user_id, login, account_type, currency, leverage, balance, created_at";
const DEPOSIT_COLUMNS: &str = "id, user_id, trading_account_id, amount, method, invoice_id, status, decided_by, \
     rejection_reason, created_at, updated_at";
const WALLET_COLUMNS: &str = "id, user_id, wallet_type, balance, commission_rate, total_commission, enabled, \
     created_at, updated_at";
const ENTRY_COLUMNS: &str = "id, wallet_id, kind, deposit_id, amount, balance_after, notes, actor_id, created_at";
const ACTIVITY_COLUMNS: &str = "id, admin_id, action, entity_type, entity_id, details, created_at";
const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, notification_type, read, created_at";

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BrokerageStore for PgStore {
    async fn begin(&self) -> ServiceResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn health_check(&self) -> ServiceResult<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ServiceError::DatabaseError(format!("PostgreSQL health check failed: {}", e)))?;
        Ok(())
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

fn parse_column<T>(raw: String) -> ServiceResult<T>
where
    T: FromStr<Err = fxdesk::Error>,
{
    raw.parse()
        .map_err(|e: fxdesk::Error| ServiceError::DatabaseError(format!("Corrupt column value: {}", e)))
}

fn user_from_row(row: &PgRow) -> ServiceResult<User> {
    let referred_by: Option<Uuid> = row.try_get("referred_by")?;
    let referral = match referred_by {
        Some(referred_by) => Some(ReferralLink {
            referred_by,
            status: parse_column(row.try_get("referral_status")?)?,
            decided_by: row.try_get("referral_decided_by")?,
            decided_at: row.try_get("referral_decided_at")?,
            rejection_reason: row.try_get("referral_rejection_reason")?,
        }),
        None => None,
    };

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        country: row.try_get("country")?,
        city: row.try_get("city")?,
        referral_code: row.try_get("referral_code")?,
        referral,
        created_at: row.try_get("created_at")?,
    })
}

fn admin_from_row(row: &PgRow) -> ServiceResult<AdminUser> {
    Ok(AdminUser {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: parse_column(row.try_get("role")?)?,
        enabled: row.try_get("enabled")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn account_from_row(row: &PgRow) -> ServiceResult<TradingAccount> {
    Ok(TradingAccount {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        login: row.try_get("login")?,
        account_type: row.try_get("account_type")?,
        currency: row.try_get("currency")?,
        leverage: row.try_get("leverage")?,
        balance: row.try_get("balance")?,
        created_at: row.try_get("created_at")?,
    })
}

fn deposit_from_row(row: &PgRow) -> ServiceResult<Deposit> {
    Ok(Deposit {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        trading_account_id: row.try_get("trading_account_id")?,
        amount: row.try_get("amount")?,
        method: row.try_get("method")?,
        invoice_id: row.try_get("invoice_id")?,
        status: parse_column(row.try_get("status")?)?,
        decided_by: row.try_get("decided_by")?,
        rejection_reason: row.try_get("rejection_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn wallet_from_row(row: &PgRow) -> ServiceResult<IbCbWallet> {
    Ok(IbCbWallet {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        wallet_type: parse_column(row.try_get("wallet_type")?)?,
        balance: row.try_get("balance")?,
        commission_rate: row.try_get("commission_rate")?,
        total_commission: row.try_get("total_commission")?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> ServiceResult<WalletEntry> {
    Ok(WalletEntry {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        kind: parse_column(row.try_get("kind")?)?,
        deposit_id: row.try_get("deposit_id")?,
        amount: row.try_get("amount")?,
        balance_after: row.try_get("balance_after")?,
        notes: row.try_get("notes")?,
        actor_id: row.try_get("actor_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn activity_from_row(row: &PgRow) -> ServiceResult<ActivityLog> {
    Ok(ActivityLog {
        id: row.try_get("id")?,
        admin_id: row.try_get("admin_id")?,
        action: row.try_get("action")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        details: row.try_get("details")?,
        created_at: row.try_get("created_at")?,
    })
}

fn notification_from_row(row: &PgRow) -> ServiceResult<Notification> {
    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        notification_type: parse_column(row.try_get("notification_type")?)?,
        read: row.try_get("read")?,
        created_at: row.try_get("created_at")?,
    })
}

fn collect<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> ServiceResult<T>) -> ServiceResult<Vec<T>> {
    rows.iter().map(map).collect()
}

impl PgTransaction {
    async fn fetch_user(&mut self, sql: &str, id: Uuid) -> ServiceResult<Option<User>> {
        let row = sqlx::query(sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn insert_user(&mut self, user: &User) -> ServiceResult<()> {
        let link = user.referral.as_ref();
        sqlx::query(
            "INSERT INTO users (id, email, full_name, country, city, referral_code, referred_by, referral_status, \
             referral_decided_by, referral_decided_at, referral_rejection_reason, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.country)
        .bind(&user.city)
        .bind(&user.referral_code)
        .bind(link.map(|l| l.referred_by))
        .bind(link.map(|l| l.status.as_str()))
        .bind(link.and_then(|l| l.decided_by))
        .bind(link.and_then(|l| l.decided_at))
        .bind(link.and_then(|l| l.rejection_reason.clone()))
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_user(&mut self, id: Uuid) -> ServiceResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        self.fetch_user(&sql, id).await
    }

    async fn get_user_for_update(&mut self, id: Uuid) -> ServiceResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1 FOR UPDATE", USER_COLUMNS);
        self.fetch_user(&sql, id).await
    }

    async fn find_user_by_email(&mut self, email: &str) -> ServiceResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(email.trim()).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_referral_code(&mut self, code: &str) -> ServiceResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE referral_code = $1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(code).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_user(&mut self, user: &User) -> ServiceResult<()> {
        let link = user.referral.as_ref();
        let result = sqlx::query(
            "UPDATE users SET email = $2, full_name = $3, country = $4, city = $5, referred_by = $6, \
             referral_status = $7, referral_decided_by = $8, referral_decided_at = $9, \
             referral_rejection_reason = $10 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.country)
        .bind(&user.city)
        .bind(link.map(|l| l.referred_by))
        .bind(link.map(|l| l.status.as_str()))
        .bind(link.and_then(|l| l.decided_by))
        .bind(link.and_then(|l| l.decided_at))
        .bind(link.and_then(|l| l.rejection_reason.clone()))
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("User", user.id));
        }
        Ok(())
    }

    async fn list_users(&mut self) -> ServiceResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        collect(rows, user_from_row)
    }

    async fn insert_admin(&mut self, admin: &AdminUser) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO admin_users (id, email, name, role, enabled, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(admin.id)
        .bind(&admin.email)
        .bind(&admin.name)
        .bind(admin.role.as_str())
        .bind(admin.enabled)
        .bind(admin.created_by)
        .bind(admin.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_admin(&mut self, id: Uuid) -> ServiceResult<Option<AdminUser>> {
        let sql = format!("SELECT {} FROM admin_users WHERE id = $1", ADMIN_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(admin_from_row).transpose()
    }

    async fn update_admin(&mut self, admin: &AdminUser) -> ServiceResult<()> {
        let result = sqlx::query("UPDATE admin_users SET name = $2, role = $3, enabled = $4 WHERE id = $1")
            .bind(admin.id)
            .bind(&admin.name)
            .bind(admin.role.as_str())
            .bind(admin.enabled)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Admin", admin.id));
        }
        Ok(())
    }

    async fn list_admins(&mut self) -> ServiceResult<Vec<AdminUser>> {
        let sql = format!("SELECT {} FROM admin_users ORDER BY created_at", ADMIN_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        collect(rows, admin_from_row)
    }

    async fn admin_countries(&mut self, admin_id: Uuid) -> ServiceResult<Vec<AdminCountryAssignment>> {
        let rows = sqlx::query(
            "SELECT admin_id, country, created_at FROM admin_country_assignments \
             WHERE admin_id = $1 ORDER BY created_at",
        )
        .bind(admin_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| -> ServiceResult<AdminCountryAssignment> {
                Ok(AdminCountryAssignment {
                    admin_id: row.try_get("admin_id")?,
                    country: row.try_get("country")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn assign_country(&mut self, assignment: &AdminCountryAssignment) -> ServiceResult<bool> {
        let result = sqlx::query(
            "INSERT INTO admin_country_assignments (admin_id, country, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(assignment.admin_id)
        .bind(assignment.country.trim())
        .bind(assignment.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_country(&mut self, admin_id: Uuid, country: &str) -> ServiceResult<bool> {
        let result = sqlx::query(
            "DELETE FROM admin_country_assignments WHERE admin_id = $1 AND lower(btrim(country)) = lower(btrim($2))",
        )
        .bind(admin_id)
        .bind(country)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_trading_account(&mut self, account: &TradingAccount) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO trading_accounts (id, user_id, login, account_type, currency, leverage, balance, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(&account.login)
        .bind(&account.account_type)
        .bind(&account.currency)
        .bind(account.leverage)
        .bind(account.balance)
        .bind(account.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_trading_account(&mut self, id: Uuid) -> ServiceResult<Option<TradingAccount>> {
        let sql = format!("SELECT {} FROM trading_accounts WHERE id = $1", ACCOUNT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn list_trading_accounts(&mut self) -> ServiceResult<Vec<TradingAccount>> {
        let sql = format!("SELECT {} FROM trading_accounts ORDER BY created_at", ACCOUNT_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        collect(rows, account_from_row)
    }

    async fn insert_deposit(&mut self, deposit: &Deposit) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO deposits (id, user_id, trading_account_id, amount, method, invoice_id, status, decided_by, \
             rejection_reason, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(deposit.id)
        .bind(deposit.user_id)
        .bind(deposit.trading_account_id)
        .bind(deposit.amount)
        .bind(&deposit.method)
        .bind(&deposit.invoice_id)
        .bind(deposit.status.as_str())
        .bind(deposit.decided_by)
        .bind(&deposit.rejection_reason)
        .bind(deposit.created_at)
        .bind(deposit.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_deposit_for_update(&mut self, id: Uuid) -> ServiceResult<Option<Deposit>> {
        let sql = format!("SELECT {} FROM deposits WHERE id = $1 FOR UPDATE", DEPOSIT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(deposit_from_row).transpose()
    }

    async fn find_deposit_by_invoice_for_update(&mut self, invoice_id: &str) -> ServiceResult<Option<Deposit>> {
        let sql = format!("SELECT {} FROM deposits WHERE invoice_id = $1 FOR UPDATE", DEPOSIT_COLUMNS);
        let row = sqlx::query(&sql).bind(invoice_id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(deposit_from_row).transpose()
    }

    async fn update_deposit(&mut self, deposit: &Deposit) -> ServiceResult<()> {
        let result = sqlx::query(
            "UPDATE deposits SET amount = $2, invoice_id = $3, status = $4, decided_by = $5, \
             rejection_reason = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(deposit.id)
        .bind(deposit.amount)
        .bind(&deposit.invoice_id)
        .bind(deposit.status.as_str())
        .bind(deposit.decided_by)
        .bind(&deposit.rejection_reason)
        .bind(deposit.updated_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Deposit", deposit.id));
        }
        Ok(())
    }

    async fn list_deposits(&mut self) -> ServiceResult<Vec<Deposit>> {
        let sql = format!("SELECT {} FROM deposits ORDER BY created_at", DEPOSIT_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        collect(rows, deposit_from_row)
    }

    async fn insert_withdrawal(&mut self, withdrawal: &Withdrawal) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO withdrawals (id, user_id, trading_account_id, amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(withdrawal.id)
        .bind(withdrawal.user_id)
        .bind(withdrawal.trading_account_id)
        .bind(withdrawal.amount)
        .bind(withdrawal.status.as_str())
        .bind(withdrawal.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_withdrawals(&mut self) -> ServiceResult<Vec<Withdrawal>> {
        let rows = sqlx::query(
            "SELECT id, user_id, trading_account_id, amount, status, created_at FROM withdrawals ORDER BY created_at",
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| -> ServiceResult<Withdrawal> {
                Ok(Withdrawal {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    trading_account_id: row.try_get("trading_account_id")?,
                    amount: row.try_get("amount")?,
                    status: parse_column(row.try_get("status")?)?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn insert_document(&mut self, document: &KycDocument) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO kyc_documents (id, user_id, document_type, status, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(document.id)
        .bind(document.user_id)
        .bind(&document.document_type)
        .bind(document.status.as_str())
        .bind(document.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_documents(&mut self) -> ServiceResult<Vec<KycDocument>> {
        let rows = sqlx::query("SELECT id, user_id, document_type, status, created_at FROM kyc_documents ORDER BY created_at")
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter()
            .map(|row| -> ServiceResult<KycDocument> {
                Ok(KycDocument {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    document_type: row.try_get("document_type")?,
                    status: parse_column(row.try_get("status")?)?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn ensure_wallet(
        &mut self,
        user_id: Uuid,
        wallet_type: WalletType,
        default_rate: Decimal,
    ) -> ServiceResult<IbCbWallet> {
        let inserted = sqlx::query(
            "INSERT INTO ib_cb_wallets (id, user_id, wallet_type, balance, commission_rate, total_commission, \
             enabled, created_at, updated_at) VALUES ($1, $2, $3, 0, $4, 0, TRUE, NOW(), NOW()) \
             ON CONFLICT (user_id, wallet_type) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(wallet_type.as_str())
        .bind(default_rate)
        .execute(&mut *self.tx)
        .await?;

        if inserted.rows_affected() > 0 {
            debug!(user_id = %user_id, wallet_type = %wallet_type, "Created commission wallet");
        }

        self.get_wallet_for_update(user_id, wallet_type)
            .await?
            .ok_or_else(|| ServiceError::Internal(format!("{} wallet of user {} vanished after upsert", wallet_type, user_id)))
    }

    async fn get_wallet(&mut self, user_id: Uuid, wallet_type: WalletType) -> ServiceResult<Option<IbCbWallet>> {
        let sql = format!("SELECT {} FROM ib_cb_wallets WHERE user_id = $1 AND wallet_type = $2", WALLET_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(wallet_type.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(wallet_from_row).transpose()
    }

    async fn get_wallet_for_update(
        &mut self,
        user_id: Uuid,
        wallet_type: WalletType,
    ) -> ServiceResult<Option<IbCbWallet>> {
        let sql = format!(
            "SELECT {} FROM ib_cb_wallets WHERE user_id = $1 AND wallet_type = $2 FOR UPDATE",
            WALLET_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(wallet_type.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(wallet_from_row).transpose()
    }

    async fn update_wallet(&mut self, wallet: &IbCbWallet) -> ServiceResult<()> {
        let result = sqlx::query(
            "UPDATE ib_cb_wallets SET balance = $2, commission_rate = $3, total_commission = $4, enabled = $5, \
             updated_at = $6 WHERE id = $1",
        )
        .bind(wallet.id)
        .bind(wallet.balance)
        .bind(wallet.commission_rate)
        .bind(wallet.total_commission)
        .bind(wallet.enabled)
        .bind(wallet.updated_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Wallet", wallet.id));
        }
        Ok(())
    }

    async fn list_wallets(&mut self) -> ServiceResult<Vec<IbCbWallet>> {
        let sql = format!("SELECT {} FROM ib_cb_wallets ORDER BY created_at", WALLET_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        collect(rows, wallet_from_row)
    }

    async fn find_commission_entry(&mut self, deposit_id: Uuid) -> ServiceResult<Option<WalletEntry>> {
        let sql = format!(
            "SELECT {} FROM wallet_entries WHERE deposit_id = $1 AND kind = 'Commission'",
            ENTRY_COLUMNS
        );
        let row = sqlx::query(&sql).bind(deposit_id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn insert_wallet_entry(&mut self, entry: &WalletEntry) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO wallet_entries (id, wallet_id, kind, deposit_id, amount, balance_after, notes, actor_id, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entry.id)
        .bind(entry.wallet_id)
        .bind(entry.kind.as_str())
        .bind(entry.deposit_id)
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(&entry.notes)
        .bind(entry.actor_id)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_wallet_entries(&mut self, wallet_id: Uuid) -> ServiceResult<Vec<WalletEntry>> {
        let sql = format!("SELECT {} FROM wallet_entries WHERE wallet_id = $1 ORDER BY created_at", ENTRY_COLUMNS);
        let rows = sqlx::query(&sql).bind(wallet_id).fetch_all(&mut *self.tx).await?;
        collect(rows, entry_from_row)
    }

    async fn append_activity(&mut self, entry: &ActivityLog) -> ServiceResult<()> {
        // A failed insert only rolls back to the savepoint
        let mut savepoint = (&mut self.tx).begin().await?;
        sqlx::query(
            "INSERT INTO activity_logs (id, admin_id, action, entity_type, entity_id, details, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id)
        .bind(entry.admin_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&mut *savepoint)
        .await?;
        savepoint.commit().await?;
        Ok(())
    }

    async fn list_activity(&mut self, admin_id: Option<Uuid>, limit: usize) -> ServiceResult<Vec<ActivityLog>> {
        let sql = format!(
            "SELECT {} FROM activity_logs WHERE ($1::uuid IS NULL OR admin_id = $1) \
             ORDER BY created_at DESC LIMIT $2",
            ACTIVITY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(admin_id)
            .bind(limit as i64)
            .fetch_all(&mut *self.tx)
            .await?;
        collect(rows, activity_from_row)
    }

    async fn insert_notification(&mut self, notification: &Notification) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, title, message, notification_type, read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.notification_type.as_str())
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_notifications(&mut self, user_id: Uuid) -> ServiceResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&mut *self.tx).await?;
        collect(rows, notification_from_row)
    }

    async fn commit(self: Box<Self>) -> ServiceResult<()> {
        let PgTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
