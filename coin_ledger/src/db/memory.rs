//! In-process implementation of `LedgerRepository`.
//!
//! All state sits behind one `tokio::sync::RwLock`. Every unit of work takes
//! the write lock once and validates everything before mutating, so a failed
//! operation leaves no trace and same-user mutations are serialized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::LedgerRepository;
use crate::ledger::{
    Account, AccountSnapshot, LedgerError, LedgerResult, NewTransaction, RedemptionDecision,
    RedemptionStatus, Resolution, SortOrder, Transaction, TransactionId, TransactionKind,
};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    /// Append order, which is creation order
    log: Vec<Transaction>,
    by_id: HashMap<TransactionId, usize>,
}

impl LedgerState {
    fn get_or_create(&mut self, user_id: &str, now: DateTime<Utc>) -> &mut Account {
        self.accounts
            .entry(user_id.to_string())
            .or_insert_with(|| Account {
                user_id: user_id.to_string(),
                balance: 0,
                created_at: now,
                last_updated: now,
            })
    }

    fn balance_of(&self, user_id: &str) -> i64 {
        self.accounts.get(user_id).map_or(0, |a| a.balance)
    }

    /// Balance after applying `delta`, without mutating anything
    fn checked_balance(&self, user_id: &str, delta: i64) -> LedgerResult<i64> {
        let available = self.balance_of(user_id);
        let new_balance = available
            .checked_add(delta)
            .ok_or(LedgerError::BalanceOverflow)?;

        if new_balance < 0 {
            return Err(LedgerError::InsufficientBalance {
                available,
                required: -delta,
            });
        }

        Ok(new_balance)
    }

    fn set_balance(&mut self, user_id: &str, balance: i64, now: DateTime<Utc>) -> Account {
        let account = self.get_or_create(user_id, now);
        account.balance = balance;
        account.last_updated = now;
        account.clone()
    }

    fn append(&mut self, entry: NewTransaction, now: DateTime<Utc>) -> Transaction {
        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            amount: entry.amount,
            description: entry.description,
            kind: entry.kind,
            created_at: now,
        };
        self.by_id.insert(transaction.id, self.log.len());
        self.log.push(transaction.clone());
        transaction
    }

    fn find(&self, id: TransactionId) -> Option<&Transaction> {
        self.by_id.get(&id).map(|&index| &self.log[index])
    }

    fn user_transactions(&self, user_id: &str) -> impl DoubleEndedIterator<Item = &Transaction> {
        self.log.iter().filter(move |t| t.user_id == user_id)
    }
}

/// In-memory ledger repository
#[derive(Clone, Default)]
pub struct MemoryLedgerRepository {
    state: Arc<RwLock<LedgerState>>,
}

impl MemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerRepository for MemoryLedgerRepository {
    async fn get_or_create_account(&self, user_id: &str) -> LedgerResult<Account> {
        if let Some(account) = self.state.read().await.accounts.get(user_id) {
            return Ok(account.clone());
        }

        let mut state = self.state.write().await;
        Ok(state.get_or_create(user_id, Utc::now()).clone())
    }

    async fn record(&self, entry: NewTransaction) -> LedgerResult<(Account, Transaction)> {
        let delta = entry.balance_delta()?;

        let mut state = self.state.write().await;
        let new_balance = state.checked_balance(&entry.user_id, delta)?;

        let now = Utc::now();
        let account = state.set_balance(&entry.user_id, new_balance, now);
        let transaction = state.append(entry, now);

        Ok((account, transaction))
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        order: SortOrder,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<Transaction>> {
        let state = self.state.read().await;
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(0));

        let transactions = match order {
            SortOrder::OldestFirst => state
                .user_transactions(user_id)
                .take(limit)
                .cloned()
                .collect(),
            SortOrder::NewestFirst => state
                .user_transactions(user_id)
                .rev()
                .take(limit)
                .cloned()
                .collect(),
        };

        Ok(transactions)
    }

    async fn find_transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        Ok(self.state.read().await.find(id).cloned())
    }

    async fn list_redemptions(
        &self,
        status: Option<RedemptionStatus>,
    ) -> LedgerResult<Vec<Transaction>> {
        let state = self.state.read().await;

        Ok(state
            .log
            .iter()
            .rev()
            .filter(|t| match (t.redemption_status(), status) {
                (Some(current), Some(wanted)) => current == wanted,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .cloned()
            .collect())
    }

    async fn resolve_redemption(
        &self,
        id: TransactionId,
        decision: RedemptionDecision,
        resolved_by: &str,
    ) -> LedgerResult<(Transaction, Account)> {
        let mut state = self.state.write().await;

        let index = *state.by_id.get(&id).ok_or(LedgerError::NotFound(id))?;
        let (user_id, amount) = {
            let transaction = &state.log[index];
            match transaction.redemption_status() {
                Some(RedemptionStatus::Pending) => {}
                current => return Err(LedgerError::InvalidTransition { id, current }),
            }
            (transaction.user_id.clone(), transaction.amount)
        };

        // Compute the refund before touching anything so an overflow aborts cleanly
        let refunded_balance = match decision {
            RedemptionDecision::Reject => Some(state.checked_balance(&user_id, amount)?),
            RedemptionDecision::Approve => None,
        };

        let now = Utc::now();
        if let TransactionKind::Redemption(redemption) = &mut state.log[index].kind {
            redemption.status = decision.target_status();
            redemption.resolution = Some(Resolution {
                resolved_by: resolved_by.to_string(),
                resolved_at: now,
            });
        }

        let account = match refunded_balance {
            Some(balance) => state.set_balance(&user_id, balance, now),
            None => state.get_or_create(&user_id, now).clone(),
        };

        Ok((state.log[index].clone(), account))
    }

    async fn snapshot(&self, user_id: &str) -> LedgerResult<AccountSnapshot> {
        let state = self.state.read().await;

        Ok(AccountSnapshot {
            account: state.accounts.get(user_id).cloned(),
            transactions: state.user_transactions(user_id).cloned().collect(),
        })
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(accounts)
    }
}
