//! Bearer-token authentication for admins and clients

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use fxdesk::AdminIdentity;

use crate::config::AuthConfig;
use crate::database::BrokerageStore;
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;

/// Who a token was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Admin,
    Client,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // Admin or user ID
    pub kind: TokenKind, // Which table `sub` refers to
    pub exp: i64,        // Expiration time
    pub iat: i64,        // Issued at
    pub jti: String,     // JWT ID
}

/// Authentication service
pub struct AuthService {
    store: Arc<dyn BrokerageStore>,
    jwt_secret: String,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(store: Arc<dyn BrokerageStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: Duration::hours(config.token_ttl_hours),
        }
    }

    /// Generate JWT token
    pub fn issue_token(&self, subject: Uuid, kind: TokenKind) -> ServiceResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            kind,
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(|e| ServiceError::Internal(format!("Failed to generate JWT: {}", e)))
    }

    /// Validate JWT token
    pub fn validate_token(&self, token: &str) -> ServiceResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &DecodingKey::from_secret(self.jwt_secret.as_ref()), &validation)
            .map(|data| data.claims)
            .map_err(|e| ServiceError::Unauthorized(format!("Invalid JWT: {}", e)))
    }

    fn subject(&self, token: &str, expected: TokenKind) -> ServiceResult<Uuid> {
        let claims = self.validate_token(token)?;
        if claims.kind != expected {
            return Err(ServiceError::Unauthorized("Token was not issued for this surface".to_string()));
        }
        Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::Unauthorized("Malformed token subject".to_string()))
    }

    /// Resolve an admin token to the identity used for scoping
    pub async fn authenticate_admin(&self, token: &str) -> ServiceResult<AdminIdentity> {
        let admin_id = self.subject(token, TokenKind::Admin)?;

        let mut tx = self.store.begin().await?;
        let admin = match tx.get_admin(admin_id).await? {
            Some(admin) if admin.enabled => admin,
            Some(_) => {
                warn!(admin_id = %admin_id, "Disabled admin attempted to authenticate");
                return Err(ServiceError::Unauthorized("Admin account is disabled".to_string()));
            }
            None => return Err(ServiceError::Unauthorized("Unknown admin".to_string())),
        };
        let countries = tx.admin_countries(admin_id).await?;

        debug!(admin_id = %admin_id, role = %admin.role, "Authenticated admin");
        Ok(AdminIdentity::new(
            admin.id,
            admin.role,
            countries.iter().map(|assignment| assignment.country.as_str()),
        ))
    }

    /// Resolve a client token to the user id
    pub async fn authenticate_client(&self, token: &str) -> ServiceResult<Uuid> {
        let user_id = self.subject(token, TokenKind::Client)?;

        let mut tx = self.store.begin().await?;
        if tx.get_user(user_id).await?.is_none() {
            return Err(ServiceError::Unauthorized("Unknown user".to_string()));
        }
        Ok(user_id)
    }
}

/// Extract the bearer token from the `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> ServiceResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ServiceError::Unauthorized("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("Invalid authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Expected a bearer token".to_string()))
}

/// Authenticated, enabled admin
pub struct AdminAuth(pub AdminIdentity);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        state.auth.authenticate_admin(token).await.map(AdminAuth)
    }
}

/// Authenticated client user
pub struct ClientAuth(pub Uuid);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ClientAuth {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        state.auth.authenticate_client(token).await.map(ClientAuth)
    }
}
