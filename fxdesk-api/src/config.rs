//! Service configuration read from the environment

use std::net::SocketAddr;

use tracing::warn;

use crate::database::DatabaseConfig;
use crate::error::ServiceError;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_JWT_SECRET: &str = "default_secret_change_in_production";

/// Token signing settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, falling back to the development secret");
            DEFAULT_JWT_SECRET.to_string()
        });

        Self {
            jwt_secret,
            token_ttl_hours: std::env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|hours: &i64| *hours > 0)
                .unwrap_or(24),
        }
    }
}

/// Top-level configuration of the API process
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    /// Creates a first super admin when the store has none
    pub bootstrap_super_admin_email: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        let bind = std::env::var("FXDESK_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|e| ServiceError::validation(format!("Invalid FXDESK_BIND '{}': {}", bind, e)))?;

        Ok(Self {
            bind_addr,
            database: DatabaseConfig::from_env(),
            auth: AuthConfig::from_env(),
            bootstrap_super_admin_email: std::env::var("BOOTSTRAP_SUPER_ADMIN_EMAIL")
                .ok()
                .filter(|email| !email.trim().is_empty()),
        })
    }

    /// In-memory configuration used by tests and local runs
    pub fn in_memory() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            bootstrap_super_admin_email: None,
        }
    }
}
