//! Integration tests for the redemption approval workflow.

use coin_ledger::db::{LedgerRepository, MemoryLedgerRepository};
use coin_ledger::ledger::{LedgerConfig, LedgerError, LedgerManager, RedemptionStatus};
use coin_ledger::redemption::RedemptionManager;
use std::sync::Arc;
use uuid::Uuid;

fn setup_managers() -> (LedgerManager, RedemptionManager) {
    let repository: Arc<dyn LedgerRepository> = Arc::new(MemoryLedgerRepository::new());
    (
        LedgerManager::new(repository.clone(), LedgerConfig::default()),
        RedemptionManager::new(repository),
    )
}

/// Credit 100 and request a 60 coin redemption
async fn pending_redemption(ledger: &LedgerManager, user_id: &str) -> Uuid {
    ledger.credit(user_id, 100, "bonus").await.unwrap();
    let receipt = ledger
        .request_redemption(user_id, 60, "upi:abc")
        .await
        .unwrap();
    assert_eq!(receipt.balance, 40);
    receipt.transaction.id
}

#[tokio::test]
async fn test_reject_refunds_reserved_amount() {
    let (ledger, redemptions) = setup_managers();
    let id = pending_redemption(&ledger, "student-1").await;

    let receipt = redemptions
        .reject(id, "admin-1")
        .await
        .expect("Reject should succeed");

    assert_eq!(receipt.balance, 100);
    assert_eq!(
        receipt.transaction.redemption_status(),
        Some(RedemptionStatus::Rejected)
    );
    assert_eq!(ledger.get_balance("student-1").await.unwrap().balance, 100);

    // The refund is carried by the status change, not an extra log entry
    assert_eq!(ledger.list_transactions("student-1").await.unwrap().len(), 2);
    assert!(ledger.reconcile("student-1").await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_approve_keeps_balance() {
    let (ledger, redemptions) = setup_managers();
    let id = pending_redemption(&ledger, "student-2").await;

    let receipt = redemptions
        .approve(id, "admin-1")
        .await
        .expect("Approve should succeed");

    assert_eq!(receipt.balance, 40);
    let redemption = receipt.transaction.redemption().unwrap();
    assert_eq!(redemption.status, RedemptionStatus::Approved);

    let resolution = redemption.resolution.as_ref().expect("resolution recorded");
    assert_eq!(resolution.resolved_by, "admin-1");
    assert!(resolution.resolved_at >= receipt.transaction.created_at);

    assert_eq!(ledger.get_balance("student-2").await.unwrap().balance, 40);
    assert!(ledger.reconcile("student-2").await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_resolution_is_terminal() {
    let (ledger, redemptions) = setup_managers();
    let id = pending_redemption(&ledger, "student-3").await;

    redemptions.approve(id, "admin-1").await.unwrap();

    let err = redemptions.approve(id, "admin-2").await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidTransition {
            current: Some(RedemptionStatus::Approved),
            ..
        }
    ));

    let err = redemptions.reject(id, "admin-2").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));

    // The failed reject must not have refunded anything
    assert_eq!(ledger.get_balance("student-3").await.unwrap().balance, 40);
}

#[tokio::test]
async fn test_double_reject_refunds_once() {
    let (ledger, redemptions) = setup_managers();
    let id = pending_redemption(&ledger, "student-4").await;

    redemptions.reject(id, "admin-1").await.unwrap();
    let err = redemptions.reject(id, "admin-1").await.unwrap_err();

    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    assert_eq!(ledger.get_balance("student-4").await.unwrap().balance, 100);
}

#[tokio::test]
async fn test_unknown_redemption_not_found() {
    let (_, redemptions) = setup_managers();
    let id = Uuid::new_v4();

    assert!(matches!(
        redemptions.approve(id, "admin-1").await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        redemptions.reject(id, "admin-1").await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(redemptions.get(id).await, Err(LedgerError::NotFound(_))));
}

#[tokio::test]
async fn test_credit_cannot_be_approved() {
    let (ledger, redemptions) = setup_managers();
    let receipt = ledger.credit("student-5", 10, "bonus").await.unwrap();

    let err = redemptions
        .approve(receipt.transaction.id, "admin-1")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::InvalidTransition { current: None, .. }
    ));
}

#[tokio::test]
async fn test_rejected_coins_are_spendable_again() {
    let (ledger, redemptions) = setup_managers();
    let id = pending_redemption(&ledger, "student-6").await;

    redemptions.reject(id, "admin-1").await.unwrap();

    let receipt = ledger.debit("student-6", 90, "shop").await.unwrap();
    assert_eq!(receipt.balance, 10);
}

#[tokio::test]
async fn test_failed_refund_leaves_redemption_pending() {
    let (ledger, redemptions) = setup_managers();
    let id = pending_redemption(&ledger, "student-11").await;

    // Fill the balance so refunding the 60 reserved coins would overflow
    ledger
        .credit("student-11", i64::MAX - 40, "jackpot")
        .await
        .unwrap();

    let err = redemptions.reject(id, "admin-1").await.unwrap_err();
    assert!(matches!(err, LedgerError::BalanceOverflow));

    let redemption = redemptions.get(id).await.unwrap();
    assert_eq!(
        redemption.redemption_status(),
        Some(RedemptionStatus::Pending)
    );
    assert!(redemption.redemption().unwrap().resolution.is_none());
    assert_eq!(
        ledger.get_balance("student-11").await.unwrap().balance,
        i64::MAX
    );
    assert!(ledger.reconcile("student-11").await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approve_and_reject_single_resolution() {
    let (ledger, redemptions) = setup_managers();
    let id = pending_redemption(&ledger, "student-7").await;

    let approve = {
        let redemptions = redemptions.clone();
        tokio::spawn(async move { redemptions.approve(id, "admin-a").await })
    };
    let reject = {
        let redemptions = redemptions.clone();
        tokio::spawn(async move { redemptions.reject(id, "admin-b").await })
    };

    let approve = approve.await.unwrap();
    let reject = reject.await.unwrap();

    let winners = [approve.is_ok(), reject.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(winners, 1, "Exactly one resolution should win");

    let expected_balance = if approve.is_ok() {
        assert!(matches!(reject, Err(LedgerError::InvalidTransition { .. })));
        40
    } else {
        assert!(matches!(approve, Err(LedgerError::InvalidTransition { .. })));
        100
    };

    assert_eq!(
        ledger.get_balance("student-7").await.unwrap().balance,
        expected_balance
    );
    assert!(ledger.reconcile("student-7").await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rejects_refund_once() {
    let (ledger, redemptions) = setup_managers();
    let id = pending_redemption(&ledger, "student-8").await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let redemptions = redemptions.clone();
            tokio::spawn(async move { redemptions.reject(id, &format!("admin-{i}")).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(matches!(e, LedgerError::InvalidTransition { .. })),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(ledger.get_balance("student-8").await.unwrap().balance, 100);
}

#[tokio::test]
async fn test_admin_queue_spans_users() {
    let (ledger, redemptions) = setup_managers();
    pending_redemption(&ledger, "student-9").await;
    let later = pending_redemption(&ledger, "student-10").await;

    let pending = redemptions.pending().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, later);
    assert!(
        pending
            .iter()
            .all(|t| t.redemption_status() == Some(RedemptionStatus::Pending))
    );
}
