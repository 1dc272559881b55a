//! Repository trait definitions for testability and dependency injection.
//!
//! [`LedgerRepository`] is the storage seam of the ledger. Every method is one
//! atomic unit of work: the account balance and the transaction log are
//! always changed together or not at all.

use async_trait::async_trait;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};

use super::{
    accounts, transactions,
    timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_timeout},
};
use crate::ledger::{
    Account, AccountSnapshot, LedgerResult, NewTransaction, RedemptionDecision, RedemptionStatus,
    SortOrder, Transaction, TransactionId,
};

/// Trait for ledger storage operations
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Get the account for a user, creating it at zero if absent
    async fn get_or_create_account(&self, user_id: &str) -> LedgerResult<Account>;

    /// Apply the entry's balance delta and append it to the log, atomically
    ///
    /// On `InsufficientBalance` (or any other error) neither the account nor
    /// the log is changed.
    async fn record(&self, entry: NewTransaction) -> LedgerResult<(Account, Transaction)>;

    /// List a user's transactions
    async fn list_transactions(
        &self,
        user_id: &str,
        order: SortOrder,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<Transaction>>;

    /// Find a transaction by id
    async fn find_transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>>;

    /// List redemptions of all users, newest first, optionally by status
    async fn list_redemptions(
        &self,
        status: Option<RedemptionStatus>,
    ) -> LedgerResult<Vec<Transaction>>;

    /// Resolve a pending redemption
    ///
    /// A rejection restores the reserved amount to the owner's balance in the
    /// same unit of work as the status change. Returns the updated transaction
    /// and the owner's account afterwards.
    async fn resolve_redemption(
        &self,
        id: TransactionId,
        decision: RedemptionDecision,
        resolved_by: &str,
    ) -> LedgerResult<(Transaction, Account)>;

    /// Consistent view of one account and its full history
    async fn snapshot(&self, user_id: &str) -> LedgerResult<AccountSnapshot>;

    /// List every account
    async fn list_accounts(&self) -> LedgerResult<Vec<Account>>;
}

/// PostgreSQL implementation of `LedgerRepository`
#[derive(Clone)]
pub struct PgLedgerRepository {
    pool: Arc<PgPool>,
    operation_timeout: Duration,
}

impl PgLedgerRepository {
    /// Create a repository with the default transaction timeout
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self::with_operation_timeout(pool, DEFAULT_TRANSACTION_TIMEOUT)
    }

    /// Create a repository whose reads and writes are all bounded by
    /// `operation_timeout`
    pub fn with_operation_timeout(pool: Arc<PgPool>, operation_timeout: Duration) -> Self {
        Self {
            pool,
            operation_timeout,
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn get_or_create_account(&self, user_id: &str) -> LedgerResult<Account> {
        with_timeout(self.operation_timeout, async {
            let mut conn = self.pool.acquire().await?;
            accounts::get_or_create(&mut conn, user_id).await
        })
        .await
    }

    async fn record(&self, entry: NewTransaction) -> LedgerResult<(Account, Transaction)> {
        let delta = entry.balance_delta()?;

        with_timeout(self.operation_timeout, async {
            let mut tx = self.pool.begin().await?;

            accounts::get_or_create(&mut tx, &entry.user_id).await?;
            // Dropping `tx` on error rolls back the lazily created account too
            let account = accounts::apply_delta(&mut tx, &entry.user_id, delta).await?;
            let transaction = transactions::append(&mut tx, &entry).await?;

            tx.commit().await?;
            Ok((account, transaction))
        })
        .await
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        order: SortOrder,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<Transaction>> {
        with_timeout(self.operation_timeout, async {
            let mut conn = self.pool.acquire().await?;
            transactions::list_by_user(&mut conn, user_id, order, limit).await
        })
        .await
    }

    async fn find_transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        with_timeout(self.operation_timeout, async {
            let mut conn = self.pool.acquire().await?;
            transactions::find(&mut conn, id).await
        })
        .await
    }

    async fn list_redemptions(
        &self,
        status: Option<RedemptionStatus>,
    ) -> LedgerResult<Vec<Transaction>> {
        with_timeout(self.operation_timeout, async {
            let mut conn = self.pool.acquire().await?;
            transactions::list_redemptions(&mut conn, status).await
        })
        .await
    }

    async fn resolve_redemption(
        &self,
        id: TransactionId,
        decision: RedemptionDecision,
        resolved_by: &str,
    ) -> LedgerResult<(Transaction, Account)> {
        with_timeout(self.operation_timeout, async {
            let mut tx = self.pool.begin().await?;

            let transaction =
                transactions::update_redemption_status(&mut tx, id, decision, resolved_by)
                    .await?;

            let account = match decision {
                RedemptionDecision::Reject => {
                    accounts::apply_delta(&mut tx, &transaction.user_id, transaction.amount)
                        .await?
                }
                RedemptionDecision::Approve => {
                    accounts::get_or_create(&mut tx, &transaction.user_id).await?
                }
            };

            tx.commit().await?;
            Ok((transaction, account))
        })
        .await
    }

    async fn snapshot(&self, user_id: &str) -> LedgerResult<AccountSnapshot> {
        with_timeout(self.operation_timeout, async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
                .execute(&mut *tx)
                .await?;

            let account = accounts::find(&mut tx, user_id).await?;
            let transactions =
                transactions::list_by_user(&mut tx, user_id, SortOrder::OldestFirst, None).await?;

            tx.commit().await?;
            Ok(AccountSnapshot {
                account,
                transactions,
            })
        })
        .await
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        with_timeout(self.operation_timeout, async {
            let mut conn = self.pool.acquire().await?;
            accounts::list(&mut conn).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> Arc<PgPool> {
        Arc::new(
            PgPoolOptions::new()
                .connect_lazy("postgres://ledger@localhost/ledger")
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_default_operation_timeout() {
        let repo = PgLedgerRepository::new(lazy_pool());
        assert_eq!(repo.operation_timeout(), DEFAULT_TRANSACTION_TIMEOUT);
    }

    #[tokio::test]
    async fn test_configured_timeout_is_kept() {
        let repo = PgLedgerRepository::with_operation_timeout(lazy_pool(), Duration::from_secs(3));
        assert_eq!(repo.operation_timeout(), Duration::from_secs(3));
        assert_eq!(repo.clone().operation_timeout(), Duration::from_secs(3));
    }
}
