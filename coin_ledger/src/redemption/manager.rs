//! Redemption manager implementation.

use std::sync::Arc;

use crate::db::LedgerRepository;
use crate::ledger::{
    LedgerError, LedgerResult, Receipt, RedemptionDecision, RedemptionStatus, Transaction,
    TransactionId, manager::validate_user_id,
};

/// Redemption manager
#[derive(Clone)]
pub struct RedemptionManager {
    repository: Arc<dyn LedgerRepository>,
}

impl RedemptionManager {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    /// Approve a pending redemption
    ///
    /// # Arguments
    ///
    /// * `id` - Redemption transaction ID
    /// * `admin_id` - Identity of the approving administrator
    ///
    /// # Returns
    ///
    /// * `LedgerResult<Receipt>` - Approved transaction and the owner's (unchanged) balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - No such transaction
    /// * `LedgerError::InvalidTransition` - Not a redemption, or already resolved
    pub async fn approve(&self, id: TransactionId, admin_id: &str) -> LedgerResult<Receipt> {
        self.resolve(id, RedemptionDecision::Approve, admin_id).await
    }

    /// Reject a pending redemption and refund the reserved coins
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - No such transaction
    /// * `LedgerError::InvalidTransition` - Not a redemption, or already resolved
    pub async fn reject(&self, id: TransactionId, admin_id: &str) -> LedgerResult<Receipt> {
        self.resolve(id, RedemptionDecision::Reject, admin_id).await
    }

    async fn resolve(
        &self,
        id: TransactionId,
        decision: RedemptionDecision,
        admin_id: &str,
    ) -> LedgerResult<Receipt> {
        validate_user_id(admin_id)?;

        let (transaction, account) = self
            .repository
            .resolve_redemption(id, decision, admin_id)
            .await
            .inspect_err(|e| {
                if matches!(e, LedgerError::InvalidTransition { .. }) {
                    log::warn!("Admin {admin_id} could not resolve redemption {id}: {e}");
                }
            })?;

        log::info!(
            "Redemption {id} {} by admin {admin_id} ({} coins, user {}, balance {})",
            decision.target_status(),
            transaction.amount,
            transaction.user_id,
            account.balance
        );

        Ok(Receipt {
            transaction,
            balance: account.balance,
        })
    }

    /// Get a redemption by id
    ///
    /// # Errors
    ///
    /// * `LedgerError::NotFound` - No redemption with this id
    pub async fn get(&self, id: TransactionId) -> LedgerResult<Transaction> {
        self.repository
            .find_transaction(id)
            .await?
            .filter(|t| t.redemption().is_some())
            .ok_or(LedgerError::NotFound(id))
    }

    /// Redemptions awaiting review, newest first
    pub async fn pending(&self) -> LedgerResult<Vec<Transaction>> {
        self.list(Some(RedemptionStatus::Pending)).await
    }

    /// All redemptions, optionally filtered by status, newest first
    pub async fn list(&self, status: Option<RedemptionStatus>) -> LedgerResult<Vec<Transaction>> {
        self.repository.list_redemptions(status).await
    }
}
