use super::*;

/// Result of refunding a single bet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BetRefund {
    Refunded { amount: u64 },
    AlreadyResolved(BetStatus),
}

impl<'a, S: State> Layer<'a, S> {
    /// Marks the event as cancelling and lists the stakes to return.
    pub(crate) async fn handle_begin_cancellation(
        &mut self,
        event_id: EventId,
    ) -> Result<Vec<PendingBet>, Error> {
        let mut event = self.event(event_id).await?;
        match event.status {
            EventStatus::Finished => return Err(Error::AlreadySettled(event_id)),
            EventStatus::Cancelled => {
                return Err(Error::InvalidState(format!(
                    "event {event_id} is already cancelled"
                )))
            }
            EventStatus::Active => {}
        }
        match event.closing {
            Some(Closing::Settling(score)) => {
                return Err(Error::InvalidState(format!(
                    "event {event_id} is settling with {score}"
                )))
            }
            Some(Closing::Cancelling) => {}
            None => {
                event.closing = Some(Closing::Cancelling);
                self.insert(Key::Event(event_id), Value::Event(event));
            }
        }
        self.pending_bets(event_id).await
    }

    /// Returns the full stake of one pending bet to its owner.
    pub(crate) async fn handle_refund_bet(
        &mut self,
        bet_id: BetId,
        event_id: EventId,
    ) -> Result<BetRefund, Error> {
        let mut bet = self.bet(bet_id).await?;
        if bet.event_id != event_id {
            return Err(Error::InvalidState(format!(
                "bet {bet_id} belongs to event {}",
                bet.event_id
            )));
        }
        if bet.status != BetStatus::Pending {
            return Ok(BetRefund::AlreadyResolved(bet.status));
        }

        let stake = signed(bet.amount)?;
        self.apply_mutation(
            bet.user_id,
            stake,
            TransactionKind::BetRefund,
            Memo::new(format!("refund for cancelled event {event_id}"))
                .with_reference(format!("bet:{bet_id}")),
        )
        .await?;
        self.adjust_invested(bet.user_id, -stake).await?;
        bet.status = BetStatus::Cancelled;
        let amount = bet.amount;
        self.insert(Key::Bet(bet_id), Value::Bet(bet));
        Ok(BetRefund::Refunded { amount })
    }

    pub(crate) async fn handle_finish_cancellation(
        &mut self,
        event_id: EventId,
    ) -> Result<Event, Error> {
        let mut event = self.event(event_id).await?;
        if event.closing != Some(Closing::Cancelling) {
            return Err(Error::InvalidState(format!(
                "event {event_id} is not being cancelled"
            )));
        }
        let remaining = self.pending_bets(event_id).await?.len();
        if remaining > 0 {
            return Err(Error::InvalidState(format!(
                "event {event_id} still has {remaining} pending bets"
            )));
        }
        event.status = EventStatus::Cancelled;
        event.closing = None;
        self.insert(Key::Event(event_id), Value::Event(event.clone()));
        Ok(event)
    }
}
