//! HTTP routes for the client portal, the back-office and provider callbacks

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use fxdesk::{AdminRole, IbCbWallet};

use crate::error::{ServiceError, ServiceResult};
use crate::middleware::{AdminAuth, ClientAuth};
use crate::models::{
    ActivityLog, AdminUser, Deposit, DepositStatus, KycDocument, Notification, TradingAccount, User, WalletEntry, Withdrawal,
};
use crate::observability::metrics_router;
use crate::services::admins::AdminView;
use crate::services::back_office::{DepositFilter, DeskStats, UserDetail};
use crate::services::client::{
    DepositRequest, DocumentRequest, OpenAccountRequest, SignupRequest, SignupResponse, WithdrawalRequest,
};
use crate::services::deposits::DepositApproval;
use crate::services::payments::{PaymentWebhook, WebhookOutcome};
use crate::state::AppState;

type Created<T> = (StatusCode, Json<T>);

fn created<T>(value: T) -> Created<T> {
    (StatusCode::CREATED, Json(value))
}

#[derive(Debug, Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RateBody {
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PayoutBody {
    pub amount: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// An empty body approves at the recorded amount; anything else must be a valid override
fn parse_approve_body(raw: &[u8]) -> ServiceResult<ApproveBody> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(ApproveBody { amount: None });
    }
    serde_json::from_slice(raw).map_err(|e| ServiceError::validation(format!("Invalid approval body: {}", e)))
}

#[derive(Debug, Deserialize)]
pub struct DepositQuery {
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub all: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminBody {
    pub email: String,
    pub name: String,
    pub role: AdminRole,
    #[serde(default)]
    pub countries: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CountryBody {
    pub country: String,
}

/// Build the full application router with its layers
pub fn create_router(state: Arc<AppState>) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/api/webhooks/payment", post(payment_webhook))
        // Client portal
        .route("/api/signup", post(signup))
        .route("/api/client/me", get(client_profile))
        .route("/api/client/trading-accounts", post(open_trading_account))
        .route("/api/client/deposits", post(create_deposit))
        .route("/api/client/withdrawals", post(request_withdrawal))
        .route("/api/client/documents", post(submit_document))
        .route("/api/client/wallet", get(client_wallet))
        .route("/api/client/notifications", get(client_notifications))
        // Back-office
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id", get(get_user))
        .route("/api/admin/referrals/:user_id/accept", post(accept_referral))
        .route("/api/admin/referrals/:user_id/reject", post(reject_referral))
        .route("/api/admin/wallets", get(list_wallets))
        .route("/api/admin/wallets/:user_id/rate", put(update_rate))
        .route("/api/admin/wallets/:user_id/payout", post(payout))
        .route("/api/admin/wallets/:user_id/enabled", put(set_wallet_enabled))
        .route("/api/admin/wallets/:user_id/entries", get(wallet_entries))
        .route("/api/admin/deposits", get(list_deposits))
        .route("/api/admin/deposits/:id/approve", post(approve_deposit))
        .route("/api/admin/deposits/:id/reject", post(reject_deposit))
        .route("/api/admin/trading-accounts", get(list_trading_accounts))
        .route("/api/admin/withdrawals", get(list_withdrawals))
        .route("/api/admin/documents", get(list_documents))
        .route("/api/admin/stats", get(stats))
        .route("/api/admin/activity", get(list_activity))
        .route("/api/admin/admins", get(list_admins).post(create_admin))
        .route("/api/admin/admins/:id/disable", post(disable_admin))
        .route("/api/admin/admins/:id/countries", post(assign_country))
        .route("/api/admin/admins/:id/countries/:country", delete(remove_country))
        .with_state(state)
        .merge(metrics_router(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy", "version": fxdesk::VERSION }))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": e.to_string() })),
        ),
    }
}

async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PaymentWebhook>,
) -> ServiceResult<Json<WebhookOutcome>> {
    state.payments.handle(payload).await.map(Json)
}

// Client portal

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> ServiceResult<Created<SignupResponse>> {
    state.client.register_user(request).await.map(created)
}

async fn client_profile(State(state): State<Arc<AppState>>, ClientAuth(user_id): ClientAuth) -> ServiceResult<Json<User>> {
    state.client.profile(user_id).await.map(Json)
}

async fn open_trading_account(
    State(state): State<Arc<AppState>>,
    ClientAuth(user_id): ClientAuth,
    Json(request): Json<OpenAccountRequest>,
) -> ServiceResult<Created<TradingAccount>> {
    state.client.open_trading_account(user_id, request).await.map(created)
}

async fn create_deposit(
    State(state): State<Arc<AppState>>,
    ClientAuth(user_id): ClientAuth,
    Json(request): Json<DepositRequest>,
) -> ServiceResult<Created<Deposit>> {
    state.client.create_deposit(user_id, request).await.map(created)
}

async fn request_withdrawal(
    State(state): State<Arc<AppState>>,
    ClientAuth(user_id): ClientAuth,
    Json(request): Json<WithdrawalRequest>,
) -> ServiceResult<Created<Withdrawal>> {
    state.client.request_withdrawal(user_id, request).await.map(created)
}

async fn submit_document(
    State(state): State<Arc<AppState>>,
    ClientAuth(user_id): ClientAuth,
    Json(request): Json<DocumentRequest>,
) -> ServiceResult<Created<KycDocument>> {
    state.client.submit_document(user_id, request).await.map(created)
}

async fn client_wallet(
    State(state): State<Arc<AppState>>,
    ClientAuth(user_id): ClientAuth,
) -> ServiceResult<Json<IbCbWallet>> {
    state.client.wallet(user_id).await.map(Json)
}

async fn client_notifications(
    State(state): State<Arc<AppState>>,
    ClientAuth(user_id): ClientAuth,
) -> ServiceResult<Json<Vec<Notification>>> {
    state.client.notifications(user_id).await.map(Json)
}

// Back-office

async fn list_users(State(state): State<Arc<AppState>>, AdminAuth(admin): AdminAuth) -> ServiceResult<Json<Vec<User>>> {
    state.back_office.list_users(&admin).await.map(Json)
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<Uuid>,
) -> ServiceResult<Json<UserDetail>> {
    state.back_office.get_user(&admin, id).await.map(Json)
}

async fn accept_referral(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(user_id): Path<Uuid>,
) -> ServiceResult<Json<User>> {
    state.referrals.accept_referral(&admin, user_id).await.map(Json)
}

async fn reject_referral(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(user_id): Path<Uuid>,
    Json(body): Json<ReasonBody>,
) -> ServiceResult<Json<User>> {
    state.referrals.reject_referral(&admin, user_id, &body.reason).await.map(Json)
}

async fn list_wallets(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
) -> ServiceResult<Json<Vec<IbCbWallet>>> {
    state.back_office.list_wallets(&admin).await.map(Json)
}

async fn update_rate(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(user_id): Path<Uuid>,
    Json(body): Json<RateBody>,
) -> ServiceResult<Json<IbCbWallet>> {
    state.commissions.update_commission_rate(&admin, user_id, body.rate).await.map(Json)
}

async fn payout(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(user_id): Path<Uuid>,
    Json(body): Json<PayoutBody>,
) -> ServiceResult<Json<IbCbWallet>> {
    state.commissions.payout(&admin, user_id, body.amount, body.notes).await.map(Json)
}

async fn set_wallet_enabled(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(user_id): Path<Uuid>,
    Json(body): Json<EnabledBody>,
) -> ServiceResult<Json<IbCbWallet>> {
    state.commissions.set_wallet_enabled(&admin, user_id, body.enabled).await.map(Json)
}

async fn wallet_entries(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(user_id): Path<Uuid>,
) -> ServiceResult<Json<Vec<WalletEntry>>> {
    state.commissions.wallet_entries(&admin, user_id).await.map(Json)
}

async fn list_deposits(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Query(query): Query<DepositQuery>,
) -> ServiceResult<Json<Vec<Deposit>>> {
    let status = query.status.as_deref().map(str::parse::<DepositStatus>).transpose()?;
    let filter = DepositFilter {
        status,
        user_id: query.user_id,
    };
    state.back_office.list_deposits(&admin, filter).await.map(Json)
}

async fn approve_deposit(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ServiceResult<Json<DepositApproval>> {
    let amount = parse_approve_body(&body)?.amount;
    state.deposits.approve_deposit(&admin, id, amount).await.map(Json)
}

async fn reject_deposit(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<ReasonBody>,
) -> ServiceResult<Json<Deposit>> {
    state.deposits.reject_deposit(&admin, id, &body.reason).await.map(Json)
}

async fn list_trading_accounts(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
) -> ServiceResult<Json<Vec<TradingAccount>>> {
    state.back_office.list_trading_accounts(&admin).await.map(Json)
}

async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
) -> ServiceResult<Json<Vec<Withdrawal>>> {
    state.back_office.list_withdrawals(&admin).await.map(Json)
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
) -> ServiceResult<Json<Vec<KycDocument>>> {
    state.back_office.list_documents(&admin).await.map(Json)
}

async fn stats(State(state): State<Arc<AppState>>, AdminAuth(admin): AdminAuth) -> ServiceResult<Json<DeskStats>> {
    state.back_office.stats(&admin).await.map(Json)
}

async fn list_activity(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Query(query): Query<ActivityQuery>,
) -> ServiceResult<Json<Vec<ActivityLog>>> {
    state.activity.list_activity(&admin, query.all, query.limit).await.map(Json)
}

async fn list_admins(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
) -> ServiceResult<Json<Vec<AdminView>>> {
    state.admins.list_admins(&admin).await.map(Json)
}

async fn create_admin(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Json(body): Json<CreateAdminBody>,
) -> ServiceResult<Created<AdminView>> {
    state
        .admins
        .create_admin(&admin, &body.email, &body.name, body.role, body.countries)
        .await
        .map(created)
}

async fn disable_admin(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<Uuid>,
) -> ServiceResult<Json<AdminUser>> {
    state.admins.disable_admin(&admin, id).await.map(Json)
}

async fn assign_country(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<CountryBody>,
) -> ServiceResult<Json<AdminView>> {
    state.admins.assign_country(&admin, id, &body.country).await.map(Json)
}

async fn remove_country(
    State(state): State<Arc<AppState>>,
    AdminAuth(admin): AdminAuth,
    Path((id, country)): Path<(Uuid, String)>,
) -> ServiceResult<Json<AdminView>> {
    state.admins.remove_country(&admin, id, &country).await.map(Json)
}
