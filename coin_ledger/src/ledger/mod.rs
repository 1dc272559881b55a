//! Ledger module providing the coin wallet: balances, the append-only
//! transaction log, and redemption requests.
//!
//! This module implements:
//! - One account per user, created lazily at zero
//! - Atomic balance mutation paired with a log append
//! - No negative balances (checked inside the atomic mutation)
//! - Redemptions that reserve coins at request time
//! - Reconciliation of stored balances against the log
//!
//! ## Example
//!
//! ```
//! use coin_ledger::db::MemoryLedgerRepository;
//! use coin_ledger::ledger::{LedgerConfig, LedgerManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = Arc::new(MemoryLedgerRepository::new());
//!     let ledger = LedgerManager::new(repository, LedgerConfig::default());
//!
//!     let receipt = ledger.credit("student-42", 100, "HealCoins added").await?;
//!     assert_eq!(receipt.balance, 100);
//!
//!     let receipt = ledger.request_redemption("student-42", 60, "upi:abc").await?;
//!     assert_eq!(receipt.balance, 40);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod manager;
pub mod models;
pub mod reconcile;

pub use config::{ConfigError, LedgerConfig};
pub use errors::{LedgerError, LedgerResult};
pub use manager::LedgerManager;
pub use models::{
    Account, AccountSnapshot, NewTransaction, Receipt, Redemption, RedemptionDecision,
    RedemptionStatus, Resolution, SortOrder, Transaction, TransactionId, TransactionKind,
    TransactionType, UserId,
};
pub use reconcile::ReconciliationReport;
