//! Ledger manager: credits, debits and redemption requests.

use std::sync::Arc;

use super::{
    config::LedgerConfig,
    errors::{LedgerError, LedgerResult},
    models::{Account, NewTransaction, Receipt, SortOrder, Transaction},
    reconcile::ReconciliationReport,
};
use crate::db::LedgerRepository;

/// Reject blank identities before any storage access
pub(crate) fn validate_user_id(user_id: &str) -> LedgerResult<()> {
    if user_id.trim().is_empty() {
        return Err(LedgerError::InvalidUserId);
    }
    Ok(())
}

fn validate_amount(amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}

/// Ledger manager
///
/// The only component that changes balances or appends to the log. Each
/// mutating call is one atomic unit of work in the repository.
#[derive(Clone)]
pub struct LedgerManager {
    repository: Arc<dyn LedgerRepository>,
    config: LedgerConfig,
}

impl LedgerManager {
    /// Create a new ledger manager
    ///
    /// # Arguments
    ///
    /// * `repository` - Storage backend
    /// * `config` - Ledger configuration
    pub fn new(repository: Arc<dyn LedgerRepository>, config: LedgerConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Get the user's account, creating it at zero if absent
    pub async fn get_balance(&self, user_id: &str) -> LedgerResult<Account> {
        validate_user_id(user_id)?;
        log::debug!("Balance lookup for user {user_id}");
        self.repository.get_or_create_account(user_id).await
    }

    /// Add coins to a user's balance
    ///
    /// # Arguments
    ///
    /// * `user_id` - User ID
    /// * `amount` - Coins to add (must be positive)
    /// * `description` - Caller-supplied label, e.g. "HealCoins added"
    ///
    /// # Returns
    ///
    /// * `LedgerResult<Receipt>` - New balance and the `credit` transaction
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount is not positive
    /// * `LedgerError::BalanceOverflow` - Balance would overflow
    pub async fn credit(&self, user_id: &str, amount: i64, description: &str) -> LedgerResult<Receipt> {
        validate_user_id(user_id)?;
        validate_amount(amount)?;

        let (account, transaction) = self
            .repository
            .record(NewTransaction::credit(user_id, amount, description))
            .await?;

        log::info!(
            "Credited {amount} coins to user {user_id} (balance {})",
            account.balance
        );

        Ok(Receipt {
            transaction,
            balance: account.balance,
        })
    }

    /// Remove coins from a user's balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount is not positive
    /// * `LedgerError::InsufficientBalance` - Amount exceeds the balance; nothing is recorded
    pub async fn debit(&self, user_id: &str, amount: i64, description: &str) -> LedgerResult<Receipt> {
        validate_user_id(user_id)?;
        validate_amount(amount)?;

        let (account, transaction) = self
            .repository
            .record(NewTransaction::debit(user_id, amount, description))
            .await
            .inspect_err(|e| log_rejection("debit", user_id, e))?;

        log::info!(
            "Debited {amount} coins from user {user_id} (balance {})",
            account.balance
        );

        Ok(Receipt {
            transaction,
            balance: account.balance,
        })
    }

    /// Request a payout of `amount` coins to `payout_reference`
    ///
    /// The amount is reserved (deducted) immediately and the redemption stays
    /// `pending` until an administrator resolves it.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount is not positive
    /// * `LedgerError::InvalidPayoutReference` - Reference is blank or too long
    /// * `LedgerError::InsufficientBalance` - Amount exceeds the balance; nothing is recorded
    pub async fn request_redemption(
        &self,
        user_id: &str,
        amount: i64,
        payout_reference: &str,
    ) -> LedgerResult<Receipt> {
        validate_user_id(user_id)?;
        validate_amount(amount)?;

        let payout_reference = payout_reference.trim();
        if payout_reference.is_empty()
            || payout_reference.len() > self.config.max_payout_reference_len
        {
            return Err(LedgerError::InvalidPayoutReference);
        }

        let (account, transaction) = self
            .repository
            .record(NewTransaction::redemption(user_id, amount, payout_reference))
            .await
            .inspect_err(|e| log_rejection("redemption", user_id, e))?;

        log::info!(
            "Redemption {} requested by user {user_id}: {amount} coins reserved (balance {})",
            transaction.id,
            account.balance
        );

        Ok(Receipt {
            transaction,
            balance: account.balance,
        })
    }

    /// Full transaction history, newest first
    pub async fn list_transactions(&self, user_id: &str) -> LedgerResult<Vec<Transaction>> {
        validate_user_id(user_id)?;
        self.repository
            .list_transactions(user_id, SortOrder::NewestFirst, None)
            .await
    }

    /// The most recent transactions, bounded by `LedgerConfig::recent_limit`
    pub async fn recent_transactions(&self, user_id: &str) -> LedgerResult<Vec<Transaction>> {
        validate_user_id(user_id)?;
        self.repository
            .list_transactions(user_id, SortOrder::NewestFirst, Some(self.config.recent_limit))
            .await
    }

    /// Compare a user's stored balance with the net of their history
    pub async fn reconcile(&self, user_id: &str) -> LedgerResult<ReconciliationReport> {
        validate_user_id(user_id)?;

        let snapshot = self.repository.snapshot(user_id).await?;
        let report = ReconciliationReport::from_snapshot(user_id, &snapshot);

        if !report.is_consistent() {
            log::warn!(
                "Ledger mismatch for user {user_id}: stored {} vs computed {}",
                report.stored_balance,
                report.computed_balance
            );
        }

        Ok(report)
    }

    /// Reconcile every known account
    pub async fn reconcile_all(&self) -> LedgerResult<Vec<ReconciliationReport>> {
        let accounts = self.repository.list_accounts().await?;
        let mut reports = Vec::with_capacity(accounts.len());

        for account in accounts {
            reports.push(self.reconcile(&account.user_id).await?);
        }

        Ok(reports)
    }
}

fn log_rejection(operation: &str, user_id: &str, err: &LedgerError) {
    if let LedgerError::InsufficientBalance {
        available,
        required,
    } = err
    {
        log::warn!(
            "Rejected {operation} for user {user_id}: required {required}, available {available}"
        );
    }
}
