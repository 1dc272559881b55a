//! # Coin Ledger
//!
//! The in-app currency ledger of a gamified learning platform: per-user coin
//! balances, an append-only transaction history, and a redemption workflow
//! that exchanges coins for an external payout after administrator review.
//!
//! ## Guarantees
//!
//! - Balances never go negative
//! - A balance change and its transaction are recorded together or not at all
//! - Concurrent mutations of one account are serialized
//! - A pending redemption is resolved exactly once
//! - The stored balance always equals the net of the user's history
//!
//! ## Core Modules
//!
//! - [`ledger`]: Models, errors, configuration and the [`LedgerManager`]
//! - [`redemption`]: The [`RedemptionManager`] approval workflow
//! - [`db`]: Storage seam with PostgreSQL and in-memory backends
//!
//! ## Example
//!
//! ```
//! use coin_ledger::{LedgerConfig, LedgerManager, RedemptionManager};
//! use coin_ledger::db::{LedgerRepository, MemoryLedgerRepository};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository: Arc<dyn LedgerRepository> = Arc::new(MemoryLedgerRepository::new());
//!     let ledger = LedgerManager::new(repository.clone(), LedgerConfig::default());
//!     let redemptions = RedemptionManager::new(repository);
//!
//!     ledger.credit("student-1", 100, "bonus").await?;
//!     let request = ledger.request_redemption("student-1", 60, "upi:abc").await?;
//!     let rejected = redemptions.reject(request.transaction.id, "admin-1").await?;
//!     assert_eq!(rejected.balance, 100);
//!
//!     Ok(())
//! }
//! ```

/// Storage backends and database utilities.
pub mod db;

/// Balances, transactions and the ledger manager.
pub mod ledger;
pub use ledger::{
    Account, LedgerConfig, LedgerError, LedgerManager, LedgerResult, Receipt,
    ReconciliationReport, RedemptionStatus, Transaction, TransactionKind,
};

/// Administrator review of redemption requests.
pub mod redemption;
pub use redemption::RedemptionManager;
