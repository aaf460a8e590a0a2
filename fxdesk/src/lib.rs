//! fxdesk core - IB referral lifecycle and commission rules
//!
//! This library holds the rules of the brokerage back-office that do not depend
//! on storage or transport: the referral state machine, commission and payout
//! arithmetic on commission wallets, and the country-scoped visibility model
//! for administrators.

pub mod error;
pub mod money;
pub mod referral;
pub mod wallet;
pub mod access;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use access::{AdminIdentity, AdminRole};
pub use referral::{ReferralLink, ReferralStatus};
pub use wallet::{IbCbWallet, WalletType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
