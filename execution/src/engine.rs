use futures::{stream, StreamExt};
use marcador_types::{
    BetId, BetMode, BettingOption, Change, Event, EventId, Index, OptionId, PayoutDetails,
    ReferralStatus, Score, Sequence, Transaction, TransactionId, TransactionKind, User, UserBet,
    UserId, VipStatus, Wallet, Withdrawal, WithdrawalId,
};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{
    layer::{
        BetRefund, BetSettlement, Commit, EventDraft, Layer, Memo, Outcome, PendingBet,
        SettlementPlan,
    },
    locks::{KeyedMutex, KeyedRwLock},
    EngineConfig, Error, State,
};

/// Runs `$body` against a fresh [`Layer`] and commits it, re-running the whole body when
/// the commit loses a race. `?` inside the body returns from the enclosing function and
/// discards the layer.
macro_rules! transact {
    ($engine:expr, $layer:ident => $body:expr) => {{
        let mut attempt = 0u32;
        loop {
            let store = $engine.store.read().await;
            let mut $layer = Layer::new(&*store, &$engine.config);
            let output = $body;
            let commit = $layer.commit();
            drop(store);
            match $engine.apply_commit(commit).await {
                Ok(()) => break Ok(output),
                Err(Error::Conflict) if attempt < $engine.config.max_commit_retries => {
                    attempt += 1;
                    warn!(attempt, "commit conflict, re-running operation");
                    tokio::task::yield_now().await;
                }
                Err(err) => break Err(err),
            }
        }
    }};
}

/// Runs a read-only `$body` against a [`Layer`]. Nothing is committed.
macro_rules! view {
    ($engine:expr, $layer:ident => $body:expr) => {{
        let store = $engine.store.read().await;
        #[allow(unused_mut)]
        let mut $layer = Layer::new(&*store, &$engine.config);
        $body
    }};
}

/// Balance and entry id produced by a ledger mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub balance: u64,
    pub transaction: TransactionId,
}

impl From<(u64, TransactionId)> for Receipt {
    fn from((balance, transaction): (u64, TransactionId)) -> Self {
        Self {
            balance,
            transaction,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalletSummary {
    pub wallet: Wallet,
    pub vip: VipStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventListing {
    pub event: Event,
    pub options: Vec<BettingOption>,
}

/// A bet that could not be paid or refunded during an event run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BetFailure {
    pub bet_id: BetId,
    pub user_id: UserId,
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub event_id: EventId,
    pub final_score: Score,
    pub mode: BetMode,
    pub winning_options: Vec<OptionId>,
    pub losing_options: Vec<OptionId>,
    pub won: u32,
    pub lost: u32,
    pub already_resolved: u32,
    /// Stakes of the bets paid out in this run.
    pub winning_stakes: u64,
    /// Stakes plus profit credited in this run.
    pub total_paid: u64,
    pub failures: Vec<BetFailure>,
    /// Whether the event reached `finished`. False leaves it settling for a rerun.
    pub finalized: bool,
}

impl SettlementReport {
    fn new(plan: &SettlementPlan) -> Self {
        let options_with = |wanted: Outcome| -> Vec<OptionId> {
            plan.outcomes
                .iter()
                .filter(|(_, outcome)| **outcome == wanted)
                .map(|(id, _)| *id)
                .collect()
        };
        Self {
            event_id: plan.event_id,
            final_score: plan.score,
            mode: plan.mode,
            winning_options: options_with(Outcome::Winning),
            losing_options: options_with(Outcome::Losing),
            won: 0,
            lost: 0,
            already_resolved: 0,
            winning_stakes: 0,
            total_paid: 0,
            failures: Vec::new(),
            finalized: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RefundReport {
    pub event_id: EventId,
    pub refunded: u32,
    pub already_resolved: u32,
    pub total_refunded: u64,
    pub failures: Vec<BetFailure>,
    pub finalized: bool,
}

/// Wallet ledger and settlement engine over a [`State`].
///
/// Every mutation runs in its own [`Layer`] and commits atomically. Operations touching a
/// wallet hold that user's lock; placement holds its event's lock shared, settlement and
/// cancellation hold it exclusively. Locks are always taken event first, then user.
pub struct Engine<S: State> {
    store: RwLock<S>,
    config: EngineConfig,
    users: KeyedMutex<UserId>,
    events: KeyedRwLock<EventId>,
    notifications: broadcast::Sender<Change>,
}

impl<S: State> Engine<S> {
    pub fn new(store: S, config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;
        let (notifications, _) = broadcast::channel(config.notification_buffer);
        Ok(Self {
            store: RwLock::new(store),
            config,
            users: KeyedMutex::new(),
            events: KeyedRwLock::new(),
            notifications,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribes to entity changes published after each successful commit.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.notifications.subscribe()
    }

    async fn apply_commit(&self, commit: Commit) -> Result<(), Error> {
        let Commit {
            guards,
            changes,
            notifications,
        } = commit;
        if changes.is_empty() {
            return Ok(());
        }
        {
            let mut store = self.store.write().await;
            for (key, expected) in &guards {
                if store.get(key).await? != *expected {
                    debug!(?key, "commit guard failed");
                    return Err(Error::Conflict);
                }
            }
            store.apply(changes).await?;
        }

        let receivers = self.notifications.receiver_count();
        debug!(changes = notifications.len(), receivers, "publishing changes");
        for change in notifications {
            // Only fails when nobody is subscribed.
            let _ = self.notifications.send(change);
        }
        Ok(())
    }

    pub async fn register_user(
        &self,
        phone: &str,
        invitation_code: Option<&str>,
    ) -> Result<User, Error> {
        let user = transact!(self, layer => layer.handle_register_user(phone, invitation_code).await?)?;
        info!(
            user_id = user.id,
            referred_by = ?user.referred_by,
            "user registered"
        );
        Ok(user)
    }

    pub async fn mint_deposit(
        &self,
        user_id: UserId,
        amount: u64,
        reference: Option<&str>,
    ) -> Result<Receipt, Error> {
        let _user = self.users.lock(user_id).await;
        let receipt = transact!(self, layer => layer.handle_deposit(user_id, amount, reference).await?)?;
        info!(user_id, amount, balance = receipt.0, "deposit credited");
        Ok(receipt.into())
    }

    pub async fn credit_commission(
        &self,
        user_id: UserId,
        amount: u64,
        reference: Option<&str>,
    ) -> Result<Receipt, Error> {
        let _user = self.users.lock(user_id).await;
        let receipt = transact!(self, layer => layer.handle_commission(user_id, amount, reference).await?)?;
        info!(user_id, amount, "referral commission credited");
        Ok(receipt.into())
    }

    /// Commission the caller should credit to `user_id` for `base_amount` at the user's
    /// current referral rate.
    pub async fn commission_quote(&self, user_id: UserId, base_amount: u64) -> Result<u64, Error> {
        Ok(self.referral_status(user_id).await?.commission_on(base_amount))
    }

    pub async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: i64,
        description: &str,
    ) -> Result<Receipt, Error> {
        let _user = self.users.lock(user_id).await;
        let receipt = transact!(self, layer => layer.handle_adjustment(user_id, delta, description).await?)?;
        info!(user_id, delta, balance = receipt.0, "manual adjustment applied");
        Ok(receipt.into())
    }

    /// Applies a signed balance change of any kind and appends its ledger entry.
    pub async fn apply_mutation(
        &self,
        user_id: UserId,
        delta: i64,
        kind: TransactionKind,
        memo: Memo,
    ) -> Result<Receipt, Error> {
        let _user = self.users.lock(user_id).await;
        let receipt = transact!(self, layer => layer.apply_mutation(user_id, delta, kind, memo.clone()).await?)?;
        Ok(receipt.into())
    }

    pub async fn create_event(&self, draft: EventDraft) -> Result<EventListing, Error> {
        let (event, options) = transact!(self, layer => layer.handle_create_event(draft.clone()).await?)?;
        info!(
            event_id = event.id,
            mode = ?event.mode,
            options = options.len(),
            "event created"
        );
        Ok(EventListing { event, options })
    }

    pub async fn place_bet(
        &self,
        user_id: UserId,
        event_id: EventId,
        option_id: OptionId,
        amount: u64,
    ) -> Result<UserBet, Error> {
        let _event = self.events.read(event_id).await;
        let _user = self.users.lock(user_id).await;
        let bet = transact!(self, layer => layer.handle_place_bet(user_id, event_id, option_id, amount).await?)?;
        info!(
            bet_id = bet.id,
            user_id,
            event_id,
            option_id,
            amount,
            "bet placed"
        );
        Ok(bet)
    }

    /// Settles every pending bet of an event against `score`.
    ///
    /// Bets that fail are reported and left pending; the event then stays settling and a
    /// rerun with the same score resumes where this one stopped.
    pub async fn settle_event(
        &self,
        event_id: EventId,
        score: Score,
    ) -> Result<SettlementReport, Error> {
        let _event = self.events.write(event_id).await;
        let plan = transact!(self, layer => layer.handle_begin_settlement(event_id, score).await?)?;
        info!(
            event_id,
            %score,
            mode = ?plan.mode,
            pending = plan.pending.len(),
            "settling event"
        );

        let results: Vec<_> = stream::iter(plan.pending.iter().copied())
            .map(|pending| self.settle_pending(pending, &plan))
            .buffer_unordered(self.config.settlement_concurrency)
            .collect()
            .await;

        let mut report = SettlementReport::new(&plan);
        for (pending, result) in results {
            match result {
                Ok(BetSettlement::Won { stake, payout, .. }) => {
                    report.won += 1;
                    report.winning_stakes = report.winning_stakes.saturating_add(stake);
                    report.total_paid = report.total_paid.saturating_add(payout);
                }
                Ok(BetSettlement::Lost { .. }) => report.lost += 1,
                Ok(BetSettlement::AlreadyResolved(_)) => report.already_resolved += 1,
                Err(err) => {
                    warn!(
                        event_id,
                        bet_id = pending.bet_id,
                        user_id = pending.user_id,
                        error = %err,
                        "bet settlement failed"
                    );
                    report.failures.push(BetFailure {
                        bet_id: pending.bet_id,
                        user_id: pending.user_id,
                        error: err.to_string(),
                    });
                }
            }
        }
        report.failures.sort_by_key(|failure| failure.bet_id);

        if report.failures.is_empty() {
            transact!(self, layer => layer.handle_finish_settlement(event_id, score).await?)?;
            report.finalized = true;
            info!(
                event_id,
                %score,
                won = report.won,
                lost = report.lost,
                total_paid = report.total_paid,
                "event settled"
            );
        } else {
            warn!(
                event_id,
                failures = report.failures.len(),
                "event left settling, rerun to retry failed bets"
            );
        }
        Ok(report)
    }

    async fn settle_pending(
        &self,
        pending: PendingBet,
        plan: &SettlementPlan,
    ) -> (PendingBet, Result<BetSettlement, Error>) {
        (pending, self.settle_bet(pending, plan).await)
    }

    async fn settle_bet(
        &self,
        pending: PendingBet,
        plan: &SettlementPlan,
    ) -> Result<BetSettlement, Error> {
        let _user = self.users.lock(pending.user_id).await;
        transact!(self, layer => layer.handle_settle_bet(pending.bet_id, plan).await?)
    }

    /// Cancels an event and returns every pending stake.
    ///
    /// Like settlement, failed refunds are reported and the event stays cancelling until
    /// a rerun refunds the rest.
    pub async fn cancel_event(&self, event_id: EventId) -> Result<RefundReport, Error> {
        let _event = self.events.write(event_id).await;
        let pending = transact!(self, layer => layer.handle_begin_cancellation(event_id).await?)?;
        info!(event_id, pending = pending.len(), "cancelling event");

        let results: Vec<_> = stream::iter(pending.iter().copied())
            .map(|pending| self.refund_pending(pending, event_id))
            .buffer_unordered(self.config.settlement_concurrency)
            .collect()
            .await;

        let mut report = RefundReport {
            event_id,
            ..RefundReport::default()
        };
        for (pending, result) in results {
            match result {
                Ok(BetRefund::Refunded { amount }) => {
                    report.refunded += 1;
                    report.total_refunded = report.total_refunded.saturating_add(amount);
                }
                Ok(BetRefund::AlreadyResolved(_)) => report.already_resolved += 1,
                Err(err) => {
                    warn!(
                        event_id,
                        bet_id = pending.bet_id,
                        user_id = pending.user_id,
                        error = %err,
                        "bet refund failed"
                    );
                    report.failures.push(BetFailure {
                        bet_id: pending.bet_id,
                        user_id: pending.user_id,
                        error: err.to_string(),
                    });
                }
            }
        }
        report.failures.sort_by_key(|failure| failure.bet_id);

        if report.failures.is_empty() {
            transact!(self, layer => layer.handle_finish_cancellation(event_id).await?)?;
            report.finalized = true;
            info!(
                event_id,
                refunded = report.refunded,
                total_refunded = report.total_refunded,
                "event cancelled"
            );
        } else {
            warn!(
                event_id,
                failures = report.failures.len(),
                "event left cancelling, rerun to retry failed refunds"
            );
        }
        Ok(report)
    }

    async fn refund_pending(
        &self,
        pending: PendingBet,
        event_id: EventId,
    ) -> (PendingBet, Result<BetRefund, Error>) {
        let _user = self.users.lock(pending.user_id).await;
        let result = self.refund_bet(pending.bet_id, event_id).await;
        (pending, result)
    }

    async fn refund_bet(&self, bet_id: BetId, event_id: EventId) -> Result<BetRefund, Error> {
        transact!(self, layer => layer.handle_refund_bet(bet_id, event_id).await?)
    }

    pub async fn request_withdrawal(
        &self,
        user_id: UserId,
        amount: u64,
        payout: PayoutDetails,
    ) -> Result<Withdrawal, Error> {
        let _user = self.users.lock(user_id).await;
        let withdrawal = transact!(self, layer => layer.handle_request_withdrawal(user_id, amount, payout.clone()).await?)?;
        info!(
            withdrawal_id = withdrawal.id,
            user_id,
            amount,
            fee = withdrawal.fee,
            "withdrawal requested"
        );
        Ok(withdrawal)
    }

    pub async fn approve_withdrawal(&self, id: WithdrawalId) -> Result<Withdrawal, Error> {
        let owner = self.withdrawal(id).await?.user_id;
        let _user = self.users.lock(owner).await;
        let withdrawal = transact!(self, layer => layer.handle_approve_withdrawal(id).await?)?;
        info!(
            withdrawal_id = id,
            user_id = owner,
            net_amount = withdrawal.net_amount,
            "withdrawal approved"
        );
        Ok(withdrawal)
    }

    pub async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        reason: &str,
    ) -> Result<Withdrawal, Error> {
        let owner = self.withdrawal(id).await?.user_id;
        let _user = self.users.lock(owner).await;
        let withdrawal = transact!(self, layer => layer.handle_reject_withdrawal(id, reason).await?)?;
        info!(withdrawal_id = id, user_id = owner, "withdrawal rejected");
        Ok(withdrawal)
    }

    pub async fn user(&self, id: UserId) -> Result<User, Error> {
        view!(self, layer => layer.user(id).await)
    }

    pub async fn wallet(&self, user_id: UserId) -> Result<WalletSummary, Error> {
        let wallet = view!(self, layer => layer.wallet(user_id).await)?;
        let vip = self
            .config
            .vip
            .status(wallet.total_deposited, wallet.balance);
        Ok(WalletSummary { wallet, vip })
    }

    pub async fn vip_status(&self, user_id: UserId) -> Result<VipStatus, Error> {
        Ok(self.wallet(user_id).await?.vip)
    }

    pub async fn referral_status(&self, user_id: UserId) -> Result<ReferralStatus, Error> {
        let referrals = view!(self, layer => layer.referral_count(user_id).await)?;
        Ok(self.config.referral.status(referrals))
    }

    /// Ledger entries of a user, oldest first.
    pub async fn transactions(&self, user_id: UserId) -> Result<Vec<Transaction>, Error> {
        view!(self, layer => {
            let wallet = layer.wallet(user_id).await?;
            let mut entries = Vec::with_capacity(wallet.next_txn_seq as usize);
            for seq in 0..wallet.next_txn_seq {
                if let Some(entry) = layer.transaction(user_id, seq).await? {
                    entries.push(entry);
                }
            }
            Ok(entries)
        })
    }

    pub async fn bets(&self, user_id: UserId) -> Result<Vec<UserBet>, Error> {
        view!(self, layer => {
            layer.user(user_id).await?;
            let mut bets = Vec::new();
            for id in layer.index(Index::UserBets(user_id)).await? {
                bets.push(layer.bet(id).await?);
            }
            Ok(bets)
        })
    }

    pub async fn event(&self, id: EventId) -> Result<EventListing, Error> {
        view!(self, layer => {
            let event = layer.event(id).await?;
            let options = layer.event_options(id).await?;
            Ok(EventListing { event, options })
        })
    }

    /// Every event, oldest first.
    pub async fn events(&self) -> Result<Vec<Event>, Error> {
        view!(self, layer => {
            let last = match layer.counter(Sequence::Event).await? {
                Some(last) => last,
                None => return Ok(Vec::new()),
            };
            let mut events = Vec::new();
            for id in 1..=last {
                events.push(layer.event(id).await?);
            }
            Ok(events)
        })
    }

    pub async fn event_bets(&self, id: EventId) -> Result<Vec<UserBet>, Error> {
        view!(self, layer => {
            layer.event(id).await?;
            let mut bets = Vec::new();
            for bet_id in layer.index(Index::EventBets(id)).await? {
                bets.push(layer.bet(bet_id).await?);
            }
            Ok(bets)
        })
    }

    pub async fn bet(&self, id: BetId) -> Result<UserBet, Error> {
        view!(self, layer => layer.bet(id).await)
    }

    pub async fn withdrawal(&self, id: WithdrawalId) -> Result<Withdrawal, Error> {
        view!(self, layer => layer.withdrawal(id).await)
    }

    pub async fn withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>, Error> {
        view!(self, layer => {
            layer.user(user_id).await?;
            let mut withdrawals = Vec::new();
            for id in layer.index(Index::UserWithdrawals(user_id)).await? {
                withdrawals.push(layer.withdrawal(id).await?);
            }
            Ok(withdrawals)
        })
    }
}
