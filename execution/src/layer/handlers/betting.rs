use super::*;

impl<'a, S: State> Layer<'a, S> {
    /// Debits the stake and records a pending bet on one option of an open event.
    pub(crate) async fn handle_place_bet(
        &mut self,
        user_id: UserId,
        event_id: EventId,
        option_id: OptionId,
        amount: u64,
    ) -> Result<UserBet, Error> {
        if amount == 0 {
            return Err(Error::Validation("bet amount must be positive".to_string()));
        }
        let event = self.event(event_id).await?;
        if !event.accepts_bets() {
            return Err(Error::InvalidState(format!(
                "event {event_id} is not accepting bets"
            )));
        }
        let option = self.option(option_id).await?;
        if option.event_id != event_id {
            return Err(Error::Validation(format!(
                "option {option_id} does not belong to event {event_id}"
            )));
        }
        let potential_profit = profit_for(amount, option.profit_bps)?;

        let id = self.next_id(Sequence::Bet).await?;
        let stake = signed(amount)?;
        self.apply_mutation(
            user_id,
            -stake,
            TransactionKind::BetDebit,
            Memo::new(format!(
                "stake on {} ({} vs {})",
                option.score, event.home, event.away
            ))
            .with_reference(format!("bet:{id}")),
        )
        .await?;
        self.adjust_invested(user_id, stake).await?;

        let bet = UserBet {
            id,
            user_id,
            event_id,
            option_id,
            amount,
            potential_profit,
            status: BetStatus::Pending,
            actual_profit: 0,
            total_return: 0,
        };
        self.insert(Key::Bet(id), Value::Bet(bet.clone()));
        self.push_index(Index::EventBets(event_id), id).await?;
        self.push_index(Index::UserBets(user_id), id).await?;
        Ok(bet)
    }

    /// Lists the bets of an event that are still pending.
    pub(crate) async fn pending_bets(
        &mut self,
        event_id: EventId,
    ) -> Result<Vec<PendingBet>, Error> {
        let mut pending = Vec::new();
        for bet_id in self.index(Index::EventBets(event_id)).await? {
            let bet = self.bet(bet_id).await?;
            if bet.status == BetStatus::Pending {
                pending.push(PendingBet {
                    bet_id,
                    user_id: bet.user_id,
                });
            }
        }
        Ok(pending)
    }
}
