/// Property-based tests for the ledger invariants using proptest
///
/// Random sequences of credits, debits, redemption requests and resolutions
/// are replayed against the in-memory ledger. After every step the balance
/// must be non-negative and match the net of the transaction history, and
/// failed operations must leave the log untouched.
use coin_ledger::db::{LedgerRepository, MemoryLedgerRepository};
use coin_ledger::ledger::{LedgerConfig, LedgerError, LedgerManager};
use coin_ledger::redemption::RedemptionManager;
use proptest::prelude::*;
use std::sync::Arc;

const USERS: [&str; 3] = ["ana", "ben", "chi"];

#[derive(Debug, Clone)]
enum Op {
    Credit(usize, i64),
    Debit(usize, i64),
    Redeem(usize, i64),
    Approve(usize),
    Reject(usize),
}

// Strategy to generate one ledger operation; resolution ops pick a redemption by index
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..USERS.len(), 1i64..500).prop_map(|(u, a)| Op::Credit(u, a)),
        (0..USERS.len(), 1i64..500).prop_map(|(u, a)| Op::Debit(u, a)),
        (0..USERS.len(), 1i64..500).prop_map(|(u, a)| Op::Redeem(u, a)),
        (0usize..16).prop_map(Op::Approve),
        (0usize..16).prop_map(Op::Reject),
    ]
}

fn run_sequence(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    runtime.block_on(async move {
        let repository: Arc<dyn LedgerRepository> = Arc::new(MemoryLedgerRepository::new());
        let ledger = LedgerManager::new(repository.clone(), LedgerConfig::default());
        let redemptions = RedemptionManager::new(repository);
        let mut requested = Vec::new();

        for op in ops {
            let touched = match &op {
                Op::Credit(u, _) | Op::Debit(u, _) | Op::Redeem(u, _) => Some(USERS[*u]),
                Op::Approve(_) | Op::Reject(_) => None,
            };
            let log_before = match touched {
                Some(user) => ledger.list_transactions(user).await.unwrap().len(),
                None => 0,
            };

            let result = match op {
                Op::Credit(u, amount) => ledger.credit(USERS[u], amount, "reward").await.map(|_| ()),
                Op::Debit(u, amount) => ledger.debit(USERS[u], amount, "spend").await.map(|_| ()),
                Op::Redeem(u, amount) => ledger
                    .request_redemption(USERS[u], amount, "upi:test")
                    .await
                    .map(|receipt| requested.push(receipt.transaction.id)),
                Op::Approve(i) if !requested.is_empty() => redemptions
                    .approve(requested[i % requested.len()], "admin")
                    .await
                    .map(|_| ()),
                Op::Reject(i) if !requested.is_empty() => redemptions
                    .reject(requested[i % requested.len()], "admin")
                    .await
                    .map(|_| ()),
                Op::Approve(_) | Op::Reject(_) => Ok(()),
            };

            match result {
                Ok(()) => {}
                Err(LedgerError::InsufficientBalance { .. }) => {
                    let user = touched.expect("only mutations can overdraw");
                    let log_after = ledger.list_transactions(user).await.unwrap().len();
                    prop_assert_eq!(log_before, log_after, "failed op appended a transaction");
                }
                Err(LedgerError::InvalidTransition { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }

            for user in USERS {
                let report = ledger.reconcile(user).await.unwrap();
                prop_assert!(report.stored_balance >= 0, "negative balance for {}", user);
                prop_assert!(
                    report.is_consistent(),
                    "{} drifted: stored {} computed {}",
                    user,
                    report.stored_balance,
                    report.computed_balance
                );
            }
        }

        Ok(())
    })
}

proptest! {
    #[test]
    fn test_ledger_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..60)) {
        run_sequence(ops)?;
    }
}
