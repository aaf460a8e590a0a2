//! Request middleware: authentication and audit logging

pub mod auth;
pub mod audit;

pub use audit::{ActivityLogger, AuditAction};
pub use auth::{AdminAuth, AuthService, ClientAuth, TokenKind};
