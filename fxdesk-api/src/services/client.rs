//! Client portal: signup, trading accounts, deposits and the client's own data

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use fxdesk::money::validate_amount;
use fxdesk::referral::{extract_referral_code, generate_referral_code};
use fxdesk::{IbCbWallet, ReferralLink, WalletType};

use crate::database::{BrokerageStore, StoreTransaction};
use crate::error::{ServiceError, ServiceResult};
use crate::middleware::{AuthService, TokenKind};
use crate::models::{Deposit, KycDocument, Notification, ReviewStatus, TradingAccount, User, Withdrawal};
use crate::services::admins::validate_email;

const REFERRAL_CODE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub full_name: String,
    pub country: String,
    #[serde(default)]
    pub city: Option<String>,
    /// Bare referral code or a signup link carrying `ref=<code>`
    #[serde(default)]
    pub referral: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccountRequest {
    #[serde(default = "default_account_type")]
    pub account_type: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_leverage")]
    pub leverage: i32,
}

fn default_account_type() -> String {
    "standard".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_leverage() -> i32 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
    pub method: String,
    #[serde(default)]
    pub trading_account_id: Option<Uuid>,
    #[serde(default)]
    pub invoice_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequest {
    pub trading_account_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRequest {
    pub document_type: String,
}

fn non_blank(value: &str, field: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(ServiceError::validation(format!("{} must not be blank", field)))
    } else {
        Ok(value.to_string())
    }
}

pub struct ClientServiceImpl {
    store: Arc<dyn BrokerageStore>,
    auth: Arc<AuthService>,
}

impl ClientServiceImpl {
    pub fn new(store: Arc<dyn BrokerageStore>, auth: Arc<AuthService>) -> Self {
        Self { store, auth }
    }

    /// Register a client, linking it to a referrer when the token names one.
    ///
    /// An unknown or malformed referral token is not an error; the client is
    /// registered without a referrer.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register_user(&self, request: SignupRequest) -> ServiceResult<SignupResponse> {
        let email = validate_email(&request.email)?;
        let full_name = non_blank(&request.full_name, "Full name")?;
        let country = non_blank(&request.country, "Country")?;
        let city = request.city.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(str::to_string);

        let mut tx = self.store.begin().await?;
        if tx.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Email {} is already registered", email)));
        }

        let referrer = self.resolve_referrer(tx.as_mut(), request.referral.as_deref()).await?;
        // generated after resolution, so a client can never refer itself
        let referral_code = Self::unique_referral_code(tx.as_mut()).await?;

        let user = User::new(
            email,
            full_name,
            Some(country),
            city,
            referral_code,
            referrer.as_ref().map(|r| ReferralLink::pending(r.id)),
        );
        tx.insert_user(&user).await?;
        tx.commit().await?;

        info!(
            user_id = %user.id,
            referred_by = ?user.referred_by(),
            "Client registered"
        );

        let token = self.auth.issue_token(user.id, TokenKind::Client)?;
        Ok(SignupResponse { user, token })
    }

    async fn resolve_referrer(&self, tx: &mut dyn StoreTransaction, token: Option<&str>) -> ServiceResult<Option<User>> {
        let token = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => return Ok(None),
        };

        let code = match extract_referral_code(token) {
            Some(code) => code,
            None => {
                info!(token, "Referral token carries no code, registering without referrer");
                return Ok(None);
            }
        };

        let referrer = tx.find_user_by_referral_code(&code).await?;
        if referrer.is_none() {
            info!(code = %code, "Unknown referral code, registering without referrer");
        }
        Ok(referrer)
    }

    async fn unique_referral_code(tx: &mut dyn StoreTransaction) -> ServiceResult<String> {
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let code = generate_referral_code();
            if tx.find_user_by_referral_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(ServiceError::Internal("Could not generate a unique referral code".to_string()))
    }

    pub async fn open_trading_account(
        &self,
        user_id: Uuid,
        request: OpenAccountRequest,
    ) -> ServiceResult<TradingAccount> {
        let account_type = non_blank(&request.account_type, "Account type")?.to_lowercase();
        let currency = non_blank(&request.currency, "Currency")?.to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ServiceError::validation(format!("'{}' is not a currency code", currency)));
        }
        if !(1..=1000).contains(&request.leverage) {
            return Err(ServiceError::validation("Leverage must be between 1 and 1000"));
        }

        let id = Uuid::new_v4();
        let account = TradingAccount {
            id,
            user_id,
            login: (10_000_000 + id.as_u128() % 90_000_000).to_string(),
            account_type,
            currency,
            leverage: request.leverage,
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        };

        let mut tx = self.store.begin().await?;
        tx.insert_trading_account(&account).await?;
        tx.commit().await?;
        info!(user_id = %user_id, login = %account.login, "Trading account opened");
        Ok(account)
    }

    async fn owned_account(tx: &mut dyn StoreTransaction, user_id: Uuid, account_id: Uuid) -> ServiceResult<TradingAccount> {
        tx.get_trading_account(account_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| ServiceError::not_found("Trading account", account_id))
    }

    /// Record a pending deposit awaiting admin approval or the provider callback
    pub async fn create_deposit(&self, user_id: Uuid, request: DepositRequest) -> ServiceResult<Deposit> {
        let method = non_blank(&request.method, "Deposit method")?;
        let invoice_id = request.invoice_id.as_deref().map(str::trim).filter(|i| !i.is_empty()).map(str::to_string);

        let mut tx = self.store.begin().await?;
        if let Some(account_id) = request.trading_account_id {
            Self::owned_account(tx.as_mut(), user_id, account_id).await?;
        }
        let deposit = Deposit::new(user_id, request.trading_account_id, request.amount, method, invoice_id)?;
        tx.insert_deposit(&deposit).await?;
        tx.commit().await?;

        info!(deposit_id = %deposit.id, amount = %deposit.amount, "Deposit created");
        Ok(deposit)
    }

    pub async fn request_withdrawal(&self, user_id: Uuid, request: WithdrawalRequest) -> ServiceResult<Withdrawal> {
        validate_amount(request.amount)?;
        let mut tx = self.store.begin().await?;
        Self::owned_account(tx.as_mut(), user_id, request.trading_account_id).await?;

        let withdrawal = Withdrawal {
            id: Uuid::new_v4(),
            user_id,
            trading_account_id: request.trading_account_id,
            amount: request.amount,
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
        };
        tx.insert_withdrawal(&withdrawal).await?;
        tx.commit().await?;
        Ok(withdrawal)
    }

    pub async fn submit_document(&self, user_id: Uuid, request: DocumentRequest) -> ServiceResult<KycDocument> {
        let document = KycDocument {
            id: Uuid::new_v4(),
            user_id,
            document_type: non_blank(&request.document_type, "Document type")?,
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
        };
        let mut tx = self.store.begin().await?;
        tx.insert_document(&document).await?;
        tx.commit().await?;
        Ok(document)
    }

    pub async fn profile(&self, user_id: Uuid) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        tx.get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))
    }

    pub async fn wallet(&self, user_id: Uuid) -> ServiceResult<IbCbWallet> {
        let mut tx = self.store.begin().await?;
        tx.get_wallet(user_id, WalletType::Ib)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No IB wallet yet".to_string()))
    }

    pub async fn notifications(&self, user_id: Uuid) -> ServiceResult<Vec<Notification>> {
        let mut tx = self.store.begin().await?;
        tx.list_notifications(user_id).await
    }
}
