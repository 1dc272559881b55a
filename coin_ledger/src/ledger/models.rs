//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

use super::errors::{LedgerError, LedgerResult};

/// User identity, issued by the external identity provider
pub type UserId = String;

/// Transaction ID type
pub type TransactionId = Uuid;

/// Account model (one per user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Stored discriminator of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
    Redeem,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Credit => write!(f, "credit"),
            TransactionType::Debit => write!(f, "debit"),
            TransactionType::Redeem => write!(f, "redeem"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            "redeem" => Ok(TransactionType::Redeem),
            other => Err(UnknownVariant::new("transaction type", other)),
        }
    }
}

/// Redemption status
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Rejected,
}

impl RedemptionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RedemptionStatus::Pending)
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedemptionStatus::Pending => write!(f, "pending"),
            RedemptionStatus::Approved => write!(f, "approved"),
            RedemptionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for RedemptionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RedemptionStatus::Pending),
            "approved" => Ok(RedemptionStatus::Approved),
            "rejected" => Ok(RedemptionStatus::Rejected),
            other => Err(UnknownVariant::new("redemption status", other)),
        }
    }
}

/// Administrator decision on a pending redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionDecision {
    Approve,
    Reject,
}

impl RedemptionDecision {
    /// Status the redemption moves to when this decision is applied
    pub fn target_status(self) -> RedemptionStatus {
        match self {
            RedemptionDecision::Approve => RedemptionStatus::Approved,
            RedemptionDecision::Reject => RedemptionStatus::Rejected,
        }
    }
}

/// Who resolved a redemption, and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub resolved_by: UserId,
    pub resolved_at: DateTime<Utc>,
}

/// Redemption payload carried only by `redeem` transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub payout_reference: String,
    pub status: RedemptionStatus,
    /// Present exactly when `status` is terminal
    pub resolution: Option<Resolution>,
}

/// What a transaction did to the balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
    #[serde(rename = "redeem")]
    Redemption(Redemption),
}

impl TransactionKind {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TransactionKind::Credit => TransactionType::Credit,
            TransactionKind::Debit => TransactionType::Debit,
            TransactionKind::Redemption(_) => TransactionType::Redeem,
        }
    }
}

/// Ledger transaction (append-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub amount: i64,
    pub description: String,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn transaction_type(&self) -> TransactionType {
        self.kind.transaction_type()
    }

    pub fn redemption(&self) -> Option<&Redemption> {
        match &self.kind {
            TransactionKind::Redemption(redemption) => Some(redemption),
            _ => None,
        }
    }

    pub fn redemption_status(&self) -> Option<RedemptionStatus> {
        self.redemption().map(|r| r.status)
    }
}

/// A transaction that has not been appended yet (no id, no timestamp)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub amount: i64,
    pub description: String,
    pub kind: TransactionKind,
}

impl NewTransaction {
    pub fn credit(user_id: &str, amount: i64, description: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            amount,
            description: description.to_string(),
            kind: TransactionKind::Credit,
        }
    }

    pub fn debit(user_id: &str, amount: i64, description: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            amount,
            description: description.to_string(),
            kind: TransactionKind::Debit,
        }
    }

    /// A pending redemption that reserves `amount` from the balance
    pub fn redemption(user_id: &str, amount: i64, payout_reference: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            amount,
            description: format!("Redemption request for {amount} coins to {payout_reference}"),
            kind: TransactionKind::Redemption(Redemption {
                payout_reference: payout_reference.to_string(),
                status: RedemptionStatus::Pending,
                resolution: None,
            }),
        }
    }

    /// Signed balance change caused by appending this entry
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount is not positive
    pub fn balance_delta(&self) -> LedgerResult<i64> {
        if self.amount <= 0 {
            return Err(LedgerError::InvalidAmount(self.amount));
        }

        Ok(match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit | TransactionKind::Redemption(_) => -self.amount,
        })
    }
}

/// Result of a balance-affecting operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The appended (or resolved) transaction
    pub transaction: Transaction,
    /// Account balance after the operation
    pub balance: i64,
}

/// Transaction listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Consistent point-in-time view of one user's account and history
#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    /// `None` if the account was never created
    pub account: Option<Account>,
    /// Oldest first
    pub transactions: Vec<Transaction>,
}

/// A stored discriminator did not match any known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_parse() {
        assert_eq!("redeem".parse::<TransactionType>(), Ok(TransactionType::Redeem));
        assert_eq!(TransactionType::Debit.to_string(), "debit");
        assert!("refund".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!RedemptionStatus::Pending.is_terminal());
        assert!(RedemptionStatus::Approved.is_terminal());
        assert!(RedemptionStatus::Rejected.is_terminal());
        assert_eq!(
            RedemptionDecision::Reject.target_status(),
            RedemptionStatus::Rejected
        );
    }

    #[test]
    fn test_balance_delta_sign() {
        assert_eq!(NewTransaction::credit("u", 100, "bonus").balance_delta().unwrap(), 100);
        assert_eq!(NewTransaction::debit("u", 40, "shop").balance_delta().unwrap(), -40);
        assert_eq!(
            NewTransaction::redemption("u", 60, "upi:abc")
                .balance_delta()
                .unwrap(),
            -60
        );
    }

    #[test]
    fn test_balance_delta_rejects_non_positive() {
        let err = NewTransaction::credit("u", 0, "nothing")
            .balance_delta()
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(0)));
    }

    #[test]
    fn test_redemption_description() {
        let entry = NewTransaction::redemption("u", 60, "upi:abc");
        assert_eq!(entry.description, "Redemption request for 60 coins to upi:abc");
    }

    #[test]
    fn test_transaction_json_shape() {
        let tx = Transaction {
            id: Uuid::nil(),
            user_id: "student-1".to_string(),
            amount: 60,
            description: "payout".to_string(),
            kind: TransactionKind::Redemption(Redemption {
                payout_reference: "upi:abc".to_string(),
                status: RedemptionStatus::Pending,
                resolution: None,
            }),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "redeem");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["payout_reference"], "upi:abc");

        let credit = Transaction {
            kind: TransactionKind::Credit,
            ..tx
        };
        let json = serde_json::to_value(&credit).unwrap();
        assert_eq!(json["type"], "credit");
        assert!(json.get("status").is_none());
    }
}
