use crate::{
    mocks::{funded_user, memory_engine, payout},
    Engine, EngineConfig, Error, Memory,
};
use marcador_types::{PayoutDetails, TransactionKind, TransactionStatus, WithdrawalStatus};

/// A "VIP 1" user: 15 000 deposited, 10 000 left after a manual debit.
async fn vip_one_user(engine: &Engine<Memory>) -> u64 {
    let user = funded_user(engine, "+51980000001", 15_000).await;
    engine
        .adjust_balance(user, -5_000, "cash payout outside the platform")
        .await
        .unwrap();
    user
}

#[tokio::test]
async fn test_vip_floor_limits_withdrawals() {
    let engine = memory_engine();
    let user = vip_one_user(&engine).await;

    let vip = engine.vip_status(user).await.unwrap();
    assert_eq!(vip.tier.name, "VIP 1");
    assert_eq!(vip.min_balance_required, 4_800);
    assert_eq!(vip.max_withdrawal, 5_200);

    assert!(matches!(
        engine.request_withdrawal(user, 5_300, payout()).await,
        Err(Error::InsufficientFunds {
            requested: 5_300,
            available: 5_200
        })
    ));
    assert_eq!(engine.wallet(user).await.unwrap().wallet.balance, 10_000);

    let withdrawal = engine
        .request_withdrawal(user, 5_200, payout())
        .await
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!((withdrawal.fee, withdrawal.net_amount), (0, 5_200));

    let summary = engine.wallet(user).await.unwrap();
    assert_eq!(summary.wallet.balance, 4_800);
    // Tier depends on lifetime deposits only.
    assert_eq!(summary.vip.tier.name, "VIP 1");

    let hold = engine
        .transactions(user)
        .await
        .unwrap()
        .into_iter()
        .find(|entry| entry.id == withdrawal.hold)
        .unwrap();
    assert_eq!(hold.kind, TransactionKind::WithdrawalHold);
    assert_eq!(hold.status, TransactionStatus::Held);
    assert_eq!(hold.delta, -5_200);
}

#[tokio::test]
async fn test_withdrawal_can_never_drain_the_wallet() {
    let engine = memory_engine();
    let user = funded_user(&engine, "+51980000002", 100).await;

    assert!(matches!(
        engine.request_withdrawal(user, 100, payout()).await,
        Err(Error::InsufficientFunds { .. })
    ));
    assert!(matches!(
        engine.request_withdrawal(user, 101, payout()).await,
        Err(Error::InsufficientFunds { .. })
    ));
    // Base tier keeps 38% of deposits.
    assert_eq!(engine.vip_status(user).await.unwrap().max_withdrawal, 62);
    engine.request_withdrawal(user, 62, payout()).await.unwrap();
    assert_eq!(engine.wallet(user).await.unwrap().wallet.balance, 38);
}

#[tokio::test]
async fn test_withdrawal_input_validation() {
    let engine = memory_engine();
    let user = funded_user(&engine, "+51980000003", 10_000).await;

    assert!(matches!(
        engine.request_withdrawal(user, 0, payout()).await,
        Err(Error::Validation(_))
    ));
    let missing_holder = PayoutDetails {
        holder: String::new(),
        ..payout()
    };
    assert!(matches!(
        engine.request_withdrawal(user, 100, missing_holder).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        engine.request_withdrawal(77, 100, payout()).await,
        Err(Error::NotFound(_))
    ));
    assert!(engine.withdrawals(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_approval_only_records_audit_entry() {
    let engine = memory_engine();
    let user = vip_one_user(&engine).await;
    let withdrawal = engine
        .request_withdrawal(user, 5_000, payout())
        .await
        .unwrap();

    let approved = engine.approve_withdrawal(withdrawal.id).await.unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Completed);

    let wallet = engine.wallet(user).await.unwrap().wallet;
    assert_eq!(wallet.balance, 5_000);
    assert_eq!(wallet.total_withdrawn, 5_000);
    assert_eq!(wallet.total_deposited, 15_000);

    let audit = engine.transactions(user).await.unwrap().pop().unwrap();
    assert_eq!(audit.kind, TransactionKind::Withdrawal);
    assert_eq!((audit.amount, audit.delta), (5_000, 0));
    assert_eq!(audit.balance_before, audit.balance_after);

    for result in [
        engine.approve_withdrawal(withdrawal.id).await,
        engine.reject_withdrawal(withdrawal.id, "duplicate").await,
    ] {
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }
    assert_eq!(engine.wallet(user).await.unwrap().wallet.balance, 5_000);
}

#[tokio::test]
async fn test_rejection_returns_the_hold() {
    let engine = memory_engine();
    let user = vip_one_user(&engine).await;
    let withdrawal = engine
        .request_withdrawal(user, 3_000, payout())
        .await
        .unwrap();
    assert_eq!(engine.wallet(user).await.unwrap().wallet.balance, 7_000);

    assert!(matches!(
        engine.reject_withdrawal(withdrawal.id, " ").await,
        Err(Error::Validation(_))
    ));
    let rejected = engine
        .reject_withdrawal(withdrawal.id, "account holder mismatch")
        .await
        .unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);
    assert_eq!(rejected.notes.as_deref(), Some("account holder mismatch"));

    let wallet = engine.wallet(user).await.unwrap().wallet;
    assert_eq!((wallet.balance, wallet.total_withdrawn), (10_000, 0));
    let refund = engine.transactions(user).await.unwrap().pop().unwrap();
    assert_eq!(refund.kind, TransactionKind::WithdrawalRefund);
    assert_eq!(refund.delta, 3_000);

    assert!(matches!(
        engine.approve_withdrawal(withdrawal.id).await,
        Err(Error::InvalidState(_))
    ));
    assert_eq!(engine.withdrawals(user).await.unwrap(), vec![rejected]);
}

#[tokio::test]
async fn test_fee_is_taken_from_the_gross_amount() {
    let config = EngineConfig {
        withdrawal_fee_bps: 250,
        ..EngineConfig::default()
    };
    let engine = Engine::new(Memory::default(), config).unwrap();
    let user = vip_one_user(&engine).await;

    let withdrawal = engine
        .request_withdrawal(user, 4_000, payout())
        .await
        .unwrap();
    assert_eq!((withdrawal.fee, withdrawal.net_amount), (100, 3_900));
    assert_eq!(engine.wallet(user).await.unwrap().wallet.balance, 6_000);
}

#[tokio::test]
async fn test_unknown_withdrawal_is_not_found() {
    let engine = memory_engine();
    assert!(matches!(
        engine.approve_withdrawal(5).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        engine.reject_withdrawal(5, "nope").await,
        Err(Error::NotFound(_))
    ));
}
