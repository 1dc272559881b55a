//! Balance reconciliation against the transaction log.

use serde::{Deserialize, Serialize};

use super::models::{AccountSnapshot, RedemptionStatus, TransactionKind, UserId};

/// Stored balance compared with the net of the user's history
///
/// Sums are `i128` so a long history cannot overflow the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub user_id: UserId,
    pub stored_balance: i64,
    pub computed_balance: i128,
    /// Sum of credits
    pub credits: i128,
    /// Sum of debits
    pub debits: i128,
    /// Sum of pending and approved redemptions
    pub reserved: i128,
    /// Sum of rejected (refunded) redemptions
    pub refunded: i128,
    pub transaction_count: usize,
}

impl ReconciliationReport {
    /// Build a report from a consistent snapshot
    ///
    /// A rejected redemption reserved its amount at request time and had it
    /// restored on rejection, so its net contribution is zero.
    pub fn from_snapshot(user_id: &str, snapshot: &AccountSnapshot) -> Self {
        let mut credits = 0i128;
        let mut debits = 0i128;
        let mut reserved = 0i128;
        let mut refunded = 0i128;

        for transaction in &snapshot.transactions {
            let amount = i128::from(transaction.amount);
            match &transaction.kind {
                TransactionKind::Credit => credits += amount,
                TransactionKind::Debit => debits += amount,
                TransactionKind::Redemption(redemption) => match redemption.status {
                    RedemptionStatus::Pending | RedemptionStatus::Approved => reserved += amount,
                    RedemptionStatus::Rejected => refunded += amount,
                },
            }
        }

        Self {
            user_id: user_id.to_string(),
            stored_balance: snapshot.account.as_ref().map_or(0, |a| a.balance),
            computed_balance: credits - debits - reserved,
            credits,
            debits,
            reserved,
            refunded,
            transaction_count: snapshot.transactions.len(),
        }
    }

    pub fn is_consistent(&self) -> bool {
        i128::from(self.stored_balance) == self.computed_balance
    }

    /// Stored minus computed balance (zero when consistent)
    pub fn drift(&self) -> i128 {
        i128::from(self.stored_balance) - self.computed_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{Account, Redemption, Resolution, Transaction};
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(amount: i64, kind: TransactionKind) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: "u".to_string(),
            amount,
            description: String::new(),
            kind,
            created_at: Utc::now(),
        }
    }

    fn redemption(amount: i64, status: RedemptionStatus) -> Transaction {
        let resolution = status.is_terminal().then(|| Resolution {
            resolved_by: "admin".to_string(),
            resolved_at: Utc::now(),
        });
        entry(
            amount,
            TransactionKind::Redemption(Redemption {
                payout_reference: "upi:u".to_string(),
                status,
                resolution,
            }),
        )
    }

    fn snapshot(balance: i64, transactions: Vec<Transaction>) -> AccountSnapshot {
        AccountSnapshot {
            account: Some(Account {
                user_id: "u".to_string(),
                balance,
                created_at: Utc::now(),
                last_updated: Utc::now(),
            }),
            transactions,
        }
    }

    #[test]
    fn test_mixed_history_reconciles() {
        let history = vec![
            entry(500, TransactionKind::Credit),
            entry(120, TransactionKind::Debit),
            redemption(100, RedemptionStatus::Approved),
            redemption(50, RedemptionStatus::Pending),
            redemption(80, RedemptionStatus::Rejected),
        ];

        let report = ReconciliationReport::from_snapshot("u", &snapshot(230, history));

        assert_eq!(report.credits, 500);
        assert_eq!(report.debits, 120);
        assert_eq!(report.reserved, 150);
        assert_eq!(report.refunded, 80);
        assert_eq!(report.computed_balance, 230);
        assert!(report.is_consistent());
        assert_eq!(report.transaction_count, 5);
    }

    #[test]
    fn test_drift_detected() {
        let history = vec![entry(100, TransactionKind::Credit)];
        let report = ReconciliationReport::from_snapshot("u", &snapshot(90, history));

        assert!(!report.is_consistent());
        assert_eq!(report.drift(), -10);
    }

    #[test]
    fn test_missing_account_counts_as_zero() {
        let report = ReconciliationReport::from_snapshot("nobody", &AccountSnapshot::default());
        assert_eq!(report.stored_balance, 0);
        assert!(report.is_consistent());
    }
}
