//! Data models for the fxdesk API

pub mod user;
pub mod admin;
pub mod brokerage;
pub mod ledger;
pub mod activity;
pub mod notifications;

pub use user::User;
pub use admin::{AdminCountryAssignment, AdminUser};
pub use brokerage::{Deposit, DepositStatus, KycDocument, ReviewStatus, TradingAccount, Withdrawal};
pub use ledger::{WalletEntry, WalletEntryKind};
pub use activity::ActivityLog;
pub use notifications::{Notification, NotificationType};
