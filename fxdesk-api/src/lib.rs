//! fxdesk API
//!
//! HTTP back-office for the fxdesk brokerage: IB referral decisions,
//! commission settlement on deposits, role-scoped listings and the client
//! portal that feeds them.

pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::Router;

use crate::config::AppConfig;
use crate::database::BrokerageStore;
use crate::error::ServiceError;
use crate::state::AppState;

/// Wire state and router together over an existing store
pub fn build_app(config: AppConfig, store: Arc<dyn BrokerageStore>) -> Result<(Arc<AppState>, Router), ServiceError> {
    let state = Arc::new(AppState::new(config, store)?);
    let router = routes::create_router(state.clone());
    Ok((state, router))
}
