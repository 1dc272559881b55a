//! Ledger error types.

use std::time::Duration;
use thiserror::Error;

use super::models::{RedemptionStatus, TransactionId};

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Storage round-trip did not finish in time
    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Missing or blank user identity
    #[error("Invalid user id")]
    InvalidUserId,

    /// Missing, blank or oversized payout destination
    #[error("Invalid payout reference")]
    InvalidPayoutReference,

    /// Insufficient balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: i64, required: i64 },

    /// Credit would overflow the balance
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Transaction is not a pending redemption
    #[error("Invalid transition for transaction {id}: {}", describe_state(.current))]
    InvalidTransition {
        id: TransactionId,
        /// Current redemption status, `None` if the transaction is not a redemption
        current: Option<RedemptionStatus>,
    },

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    NotFound(TransactionId),
}

fn describe_state(current: &Option<RedemptionStatus>) -> String {
    match current {
        Some(status) => format!("redemption is already {status}"),
        None => "not a redemption".to_string(),
    }
}

impl LedgerError {
    /// Whether the caller may retry the same operation
    ///
    /// Only storage failures are retryable; a failed attempt never leaves a
    /// partial account mutation or transaction behind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Database(_) | LedgerError::Timeout(_))
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Database(_) | LedgerError::Timeout(_) => "storage_error",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InvalidUserId => "invalid_user_id",
            LedgerError::InvalidPayoutReference => "invalid_payout_reference",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::BalanceOverflow => "balance_overflow",
            LedgerError::InvalidTransition { .. } => "invalid_transition",
            LedgerError::NotFound(_) => "not_found",
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Storage errors are sanitized to prevent information disclosure about
    /// the internal system structure.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) | LedgerError::Timeout(_) => {
                "Ledger temporarily unavailable, please retry".to_string()
            }
            LedgerError::InsufficientBalance { .. } => "Insufficient wallet balance".to_string(),
            LedgerError::InvalidTransition { .. } | LedgerError::NotFound(_) => {
                "Invalid redemption request".to_string()
            }
            // All other errors are safe to expose
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_storage_errors_are_retryable() {
        assert!(LedgerError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(LedgerError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!LedgerError::InvalidAmount(-5).is_retryable());
        assert!(
            !LedgerError::InsufficientBalance {
                available: 10,
                required: 20
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_client_message_hides_database_details() {
        let err = LedgerError::Database(sqlx::Error::Protocol("relation missing".to_string()));
        let msg = err.client_message();
        assert!(!msg.contains("relation"));
        assert_eq!(err.code(), "storage_error");
    }

    #[test]
    fn test_invalid_transition_display() {
        let id = Uuid::nil();
        let already = LedgerError::InvalidTransition {
            id,
            current: Some(RedemptionStatus::Approved),
        };
        assert!(already.to_string().contains("already approved"));

        let credit = LedgerError::InvalidTransition { id, current: None };
        assert!(credit.to_string().contains("not a redemption"));
        assert_eq!(credit.code(), "invalid_transition");
    }
}
