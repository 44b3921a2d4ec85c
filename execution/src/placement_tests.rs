use crate::{
    mocks::{funded_user, memory_engine},
    Engine, Error, EventDraft, Memo, Memory, Missing, OptionDraft,
};
use marcador_types::{
    BetMode, BetStatus, Change, EventStatus, Score, TransactionKind, TransactionStatus,
};
use std::sync::Arc;

fn two_option_draft() -> EventDraft {
    EventDraft {
        home: "Alianza Lima".to_string(),
        away: "Sporting Cristal".to_string(),
        scheduled_at: 1_760_000_000_000,
        mode: BetMode::Normal,
        suggested_score: None,
        options: vec![
            OptionDraft {
                score: Score::new(1, 0),
                profit_bps: 1_000,
            },
            OptionDraft {
                score: Score::new(2, 0),
                profit_bps: 2_500,
            },
        ],
    }
}

#[tokio::test]
async fn test_register_links_invitation_codes() {
    let engine = memory_engine();
    let inviter = engine.register_user("+51911111111", None).await.unwrap();
    assert_eq!(inviter.id, 1);
    assert_eq!(inviter.referred_by, None);

    let code = inviter.invitation_code.to_lowercase();
    let invited = engine
        .register_user(" +51922222222 ", Some(&code))
        .await
        .unwrap();
    assert_eq!(invited.referred_by, Some(inviter.id));
    assert_eq!(invited.phone, "+51922222222");
    assert_ne!(invited.invitation_code, inviter.invitation_code);

    let status = engine.referral_status(inviter.id).await.unwrap();
    assert_eq!(status.referrals, 1);
    assert_eq!(status.rate_bps, 0);

    let wallet = engine.wallet(invited.id).await.unwrap().wallet;
    assert_eq!(wallet.balance, 0);
    assert_eq!(wallet.next_txn_seq, 0);
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let engine = memory_engine();
    assert!(matches!(
        engine.register_user("   ", None).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        engine.register_user("+51933333333", Some("ZZZZZZ")).await,
        Err(Error::NotFound(Missing::InvitationCode(_)))
    ));
    // Failed registrations allocate nothing.
    let user = engine.register_user("+51933333333", None).await.unwrap();
    assert_eq!(user.id, 1);
}

#[tokio::test]
async fn test_referral_tier_boundaries() {
    let engine = memory_engine();
    let inviter = engine.register_user("+51900000000", None).await.unwrap();
    let mut rates = Vec::new();
    for i in 1..=20u32 {
        engine
            .register_user(&format!("+5190000{i:04}"), Some(&inviter.invitation_code))
            .await
            .unwrap();
        if matches!(i, 9 | 10 | 19 | 20) {
            let status = engine.referral_status(inviter.id).await.unwrap();
            rates.push((i, status.tier_name, status.rate_bps));
        }
    }
    assert_eq!(
        rates,
        vec![
            (9, "Sin Nivel".to_string(), 0),
            (10, "Nivel 1".to_string(), 200),
            (19, "Nivel 1".to_string(), 200),
            (20, "Nivel 2".to_string(), 300),
        ]
    );
    assert_eq!(engine.commission_quote(inviter.id, 10_000).await.unwrap(), 300);

    let receipt = engine
        .credit_commission(inviter.id, 300, Some("payout:2026-10"))
        .await
        .unwrap();
    assert_eq!(receipt.balance, 300);
    let entries = engine.transactions(inviter.id).await.unwrap();
    assert_eq!(entries[0].kind, TransactionKind::ReferralCommission);
    // Commissions are not deposits.
    assert_eq!(engine.wallet(inviter.id).await.unwrap().wallet.total_deposited, 0);
}

#[tokio::test]
async fn test_place_bet_debits_and_records() {
    let engine = memory_engine();
    let user = funded_user(&engine, "+51944444444", 15_000).await;
    let listing = engine.create_event(two_option_draft()).await.unwrap();
    let option = &listing.options[1];

    let bet = engine
        .place_bet(user, listing.event.id, option.id, 4_000)
        .await
        .unwrap();
    assert_eq!(bet.status, BetStatus::Pending);
    assert_eq!(bet.potential_profit, 1_000);

    let wallet = engine.wallet(user).await.unwrap().wallet;
    assert_eq!(wallet.balance, 11_000);
    assert_eq!(wallet.total_invested, 4_000);
    assert_eq!(wallet.total_deposited, 15_000);

    let entries = engine.transactions(user).await.unwrap();
    let debits: Vec<_> = entries
        .iter()
        .filter(|entry| entry.kind == TransactionKind::BetDebit)
        .collect();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].delta, -4_000);
    assert_eq!(debits[0].status, TransactionStatus::Completed);
    assert_eq!(debits[0].reference.as_deref(), Some("bet:1"));

    assert_eq!(engine.bets(user).await.unwrap(), vec![bet.clone()]);
    assert_eq!(engine.event_bets(listing.event.id).await.unwrap(), vec![bet]);
}

#[tokio::test]
async fn test_failed_placement_leaves_no_trace() {
    let engine = memory_engine();
    let user = funded_user(&engine, "+51955555555", 1_000).await;
    let listing = engine.create_event(two_option_draft()).await.unwrap();
    let event_id = listing.event.id;
    let option_id = listing.options[0].id;

    assert!(matches!(
        engine.place_bet(user, event_id, option_id, 1_001).await,
        Err(Error::InsufficientFunds {
            requested: 1_001,
            available: 1_000
        })
    ));
    assert!(matches!(
        engine.place_bet(user, event_id, option_id, 0).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        engine.place_bet(user, 99, option_id, 10).await,
        Err(Error::NotFound(Missing::Event(99)))
    ));
    assert!(matches!(
        engine.place_bet(user, event_id, 99, 10).await,
        Err(Error::NotFound(Missing::BettingOption(99)))
    ));
    assert!(matches!(
        engine.place_bet(42, event_id, option_id, 10).await,
        Err(Error::NotFound(Missing::Wallet(42)))
    ));

    let other = engine.create_event(two_option_draft()).await.unwrap();
    assert!(matches!(
        engine
            .place_bet(user, event_id, other.options[0].id, 10)
            .await,
        Err(Error::Validation(_))
    ));

    let wallet = engine.wallet(user).await.unwrap().wallet;
    assert_eq!((wallet.balance, wallet.total_invested), (1_000, 0));
    assert_eq!(engine.transactions(user).await.unwrap().len(), 1);
    assert!(engine.bets(user).await.unwrap().is_empty());

    // The whole balance can be staked.
    let bet = engine.place_bet(user, event_id, option_id, 1_000).await.unwrap();
    assert_eq!(bet.id, 1);
    assert_eq!(engine.wallet(user).await.unwrap().wallet.balance, 0);
}

#[tokio::test]
async fn test_closed_events_reject_bets() {
    let engine = memory_engine();
    let user = funded_user(&engine, "+51966666666", 1_000).await;
    let listing = engine.create_event(two_option_draft()).await.unwrap();
    engine
        .settle_event(listing.event.id, Score::new(1, 0))
        .await
        .unwrap();

    let result = engine
        .place_bet(user, listing.event.id, listing.options[0].id, 100)
        .await;
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert_eq!(engine.wallet(user).await.unwrap().wallet.balance, 1_000);
}

#[tokio::test]
async fn test_create_event_defaults_to_catalog() {
    let engine = memory_engine();
    let listing = engine
        .create_event(EventDraft {
            options: Vec::new(),
            ..two_option_draft()
        })
        .await
        .unwrap();
    assert_eq!(listing.options.len(), engine.config().score_catalog.len());
    assert!(listing
        .options
        .iter()
        .all(|option| option.profit_bps == engine.config().default_profit_bps));
    assert_eq!(listing.event.status, EventStatus::Active);
    assert_eq!(engine.event(listing.event.id).await.unwrap(), listing);
    assert_eq!(engine.events().await.unwrap(), vec![listing.event]);
}

#[tokio::test]
async fn test_create_event_validation() {
    let engine = memory_engine();
    let inverse_without_suggestion = EventDraft {
        mode: BetMode::Inverse,
        ..two_option_draft()
    };
    assert!(matches!(
        engine.create_event(inverse_without_suggestion).await,
        Err(Error::Validation(_))
    ));

    let mut duplicate = two_option_draft();
    duplicate.options[1].score = Score::new(1, 0);
    assert!(matches!(
        engine.create_event(duplicate).await,
        Err(Error::Validation(_))
    ));

    let mut free = two_option_draft();
    free.options[0].profit_bps = 0;
    assert!(matches!(
        engine.create_event(free).await,
        Err(Error::Validation(_))
    ));

    let unnamed = EventDraft {
        home: " ".to_string(),
        ..two_option_draft()
    };
    assert!(matches!(
        engine.create_event(unnamed).await,
        Err(Error::Validation(_))
    ));
    assert!(engine.events().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_adjustments_respect_balance() {
    let engine = memory_engine();
    let user = funded_user(&engine, "+51977777777", 500).await;

    assert!(matches!(
        engine.adjust_balance(user, -501, "chargeback").await,
        Err(Error::InsufficientFunds { .. })
    ));
    assert!(matches!(
        engine.adjust_balance(user, 10, "  ").await,
        Err(Error::Validation(_))
    ));
    let receipt = engine.adjust_balance(user, -200, "chargeback").await.unwrap();
    assert_eq!(receipt.balance, 300);
    assert_eq!(receipt.transaction.seq, 1);

    let receipt = engine
        .apply_mutation(
            user,
            50,
            TransactionKind::ManualAdjustment,
            Memo::new("goodwill").with_reference("ticket:81"),
        )
        .await
        .unwrap();
    assert_eq!(receipt.balance, 350);
}

#[tokio::test]
async fn test_commits_publish_changes() {
    let engine = memory_engine();
    let user = funded_user(&engine, "+51988888888", 1_000).await;
    let listing = engine.create_event(two_option_draft()).await.unwrap();
    let mut updates = engine.subscribe();

    engine
        .place_bet(user, listing.event.id, listing.options[0].id, 100)
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(change) = updates.try_recv() {
        seen.push(change);
    }
    assert_eq!(seen.len(), 3);
    assert!(seen
        .iter()
        .any(|change| matches!(change, Change::Wallet(wallet) if wallet.balance == 900)));
    assert!(seen
        .iter()
        .any(|change| matches!(change, Change::Transaction(entry) if entry.delta == -100)));
    assert!(seen
        .iter()
        .any(|change| matches!(change, Change::Bet(bet) if bet.amount == 100)));
    assert!(seen.iter().all(|change| change.user() == Some(user)));

    // Failed operations publish nothing.
    let _ = engine
        .place_bet(user, listing.event.id, listing.options[0].id, 5_000)
        .await;
    assert!(updates.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bets_never_overdraw() {
    let engine: Arc<Engine<Memory>> = Arc::new(memory_engine());
    let user = funded_user(&engine, "+51999999999", 1_000).await;
    let listing = engine.create_event(two_option_draft()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = engine.clone();
        let event_id = listing.event.id;
        let option_id = listing.options[0].id;
        handles.push(tokio::spawn(async move {
            engine.place_bet(user, event_id, option_id, 300).await
        }));
    }
    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(Error::InsufficientFunds { .. }) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(accepted, 3);

    let wallet = engine.wallet(user).await.unwrap().wallet;
    assert_eq!(wallet.balance, 100);
    assert_eq!(wallet.total_invested, 900);
    assert_eq!(engine.bets(user).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_users_get_distinct_ids() {
    let engine: Arc<Engine<Memory>> = Arc::new(memory_engine());
    let listing = engine.create_event(two_option_draft()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let engine = engine.clone();
        let event_id = listing.event.id;
        let option_id = listing.options[(i % 2) as usize].id;
        handles.push(tokio::spawn(async move {
            let user = engine
                .register_user(&format!("+5191234{i:04}"), None)
                .await?;
            engine.mint_deposit(user.id, 1_000, None).await?;
            engine.place_bet(user.id, event_id, option_id, 250).await
        }));
    }
    let mut bet_ids = Vec::new();
    for handle in handles {
        bet_ids.push(handle.await.unwrap().unwrap().id);
    }
    bet_ids.sort_unstable();
    assert_eq!(bet_ids, (1..=8).collect::<Vec<_>>());

    let on_event = engine.event_bets(listing.event.id).await.unwrap();
    assert_eq!(on_event.len(), 8);
    for bet in on_event {
        let wallet = engine.wallet(bet.user_id).await.unwrap().wallet;
        assert_eq!((wallet.balance, wallet.total_invested), (750, 250));
    }
}
