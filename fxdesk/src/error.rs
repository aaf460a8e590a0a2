//! Error types for the fxdesk core library

use rust_decimal::Decimal;
use thiserror::Error;

/// Business-rule violations raised by the core domain
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid state transition: {entity} is {current}")]
    InvalidStateTransition { entity: String, current: String },

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Decimal, available: Decimal },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(entity: impl Into<String>, current: impl ToString) -> Self {
        Self::InvalidStateTransition {
            entity: entity.into(),
            current: current.to_string(),
        }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
