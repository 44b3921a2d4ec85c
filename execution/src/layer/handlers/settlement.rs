use super::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Winning,
    Losing,
}

/// Result of settling a single bet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BetSettlement {
    Won { stake: u64, profit: u64, payout: u64 },
    Lost { stake: u64 },
    /// The bet had already left `pending`; nothing was written.
    AlreadyResolved(BetStatus),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PendingBet {
    pub bet_id: BetId,
    pub user_id: UserId,
}

/// Everything a settlement run decides up front, before paying any bet.
#[derive(Clone, Debug)]
pub(crate) struct SettlementPlan {
    pub event_id: EventId,
    pub score: Score,
    pub mode: BetMode,
    pub outcomes: BTreeMap<OptionId, Outcome>,
    pub pending: Vec<PendingBet>,
}

/// Profit owed on a winning stake at `profit_bps`, rounded down.
pub fn profit_for(amount: u64, profit_bps: u32) -> Result<u64, Error> {
    let profit = (amount as u128) * (profit_bps as u128) / (BPS_SCALE as u128);
    u64::try_from(profit)
        .map_err(|_| Error::Validation(format!("profit on {amount} overflows")))
}

/// Classifies every option of an event against the final score.
///
/// Normal mode: the option matching `actual` wins, the rest lose. Inverse mode: when the
/// suggested score comes true every option wins; otherwise the option matching `actual`
/// loses and all others win.
pub fn classify(
    mode: BetMode,
    suggested: Option<Score>,
    options: &[BettingOption],
    actual: Score,
) -> Result<BTreeMap<OptionId, Outcome>, Error> {
    let outcome = |score: Score| match mode {
        BetMode::Normal if score == actual => Outcome::Winning,
        BetMode::Normal => Outcome::Losing,
        BetMode::Inverse if Some(actual) == suggested => Outcome::Winning,
        BetMode::Inverse if score == actual => Outcome::Losing,
        BetMode::Inverse => Outcome::Winning,
    };
    if mode == BetMode::Inverse && suggested.is_none() {
        return Err(Error::InvalidState(
            "inverse event has no suggested score".to_string(),
        ));
    }
    Ok(options
        .iter()
        .map(|option| (option.id, outcome(option.score)))
        .collect())
}

impl<'a, S: State> Layer<'a, S> {
    /// Marks the event as settling with `score` and plans the run.
    ///
    /// Re-entering with the same score resumes an interrupted run.
    pub(crate) async fn handle_begin_settlement(
        &mut self,
        event_id: EventId,
        score: Score,
    ) -> Result<SettlementPlan, Error> {
        let mut event = self.event(event_id).await?;
        match event.status {
            EventStatus::Finished => return Err(Error::AlreadySettled(event_id)),
            EventStatus::Cancelled => {
                return Err(Error::InvalidState(format!(
                    "event {event_id} was cancelled"
                )))
            }
            EventStatus::Active => {}
        }
        match event.closing {
            Some(Closing::Cancelling) => {
                return Err(Error::InvalidState(format!(
                    "event {event_id} is being cancelled"
                )))
            }
            Some(Closing::Settling(current)) if current != score => {
                return Err(Error::InvalidState(format!(
                    "event {event_id} is already settling with {current}"
                )))
            }
            Some(Closing::Settling(_)) => {}
            None => {
                event.closing = Some(Closing::Settling(score));
                self.insert(Key::Event(event_id), Value::Event(event.clone()));
            }
        }

        let options = self.event_options(event_id).await?;
        let outcomes = classify(event.mode, event.suggested_score, &options, score)?;
        let pending = self.pending_bets(event_id).await?;
        Ok(SettlementPlan {
            event_id,
            score,
            mode: event.mode,
            outcomes,
            pending,
        })
    }

    /// Resolves one pending bet according to the plan. Already-resolved bets are left as is.
    pub(crate) async fn handle_settle_bet(
        &mut self,
        bet_id: BetId,
        plan: &SettlementPlan,
    ) -> Result<BetSettlement, Error> {
        let mut bet = self.bet(bet_id).await?;
        if bet.event_id != plan.event_id {
            return Err(Error::InvalidState(format!(
                "bet {bet_id} belongs to event {}",
                bet.event_id
            )));
        }
        if bet.status != BetStatus::Pending {
            return Ok(BetSettlement::AlreadyResolved(bet.status));
        }
        let outcome = plan
            .outcomes
            .get(&bet.option_id)
            .copied()
            .ok_or(Error::NotFound(Missing::BettingOption(bet.option_id)))?;

        let stake = signed(bet.amount)?;
        self.adjust_invested(bet.user_id, -stake).await?;
        let result = match outcome {
            Outcome::Winning => {
                let option = self.option(bet.option_id).await?;
                let profit = profit_for(bet.amount, option.profit_bps)?;
                let payout = bet.amount.checked_add(profit).ok_or_else(|| {
                    Error::InvalidState(format!("payout of bet {bet_id} overflows"))
                })?;
                self.apply_mutation(
                    bet.user_id,
                    signed(payout)?,
                    TransactionKind::BetWin,
                    Memo::new(format!("win on {} ({})", option.score, plan.score))
                        .with_reference(format!("bet:{bet_id}")),
                )
                .await?;
                bet.status = BetStatus::Won;
                bet.actual_profit = profit;
                bet.total_return = payout;
                BetSettlement::Won {
                    stake: bet.amount,
                    profit,
                    payout,
                }
            }
            Outcome::Losing => {
                bet.status = BetStatus::Lost;
                BetSettlement::Lost { stake: bet.amount }
            }
        };
        self.insert(Key::Bet(bet_id), Value::Bet(bet));
        Ok(result)
    }

    /// Marks the event finished once no bet is pending.
    pub(crate) async fn handle_finish_settlement(
        &mut self,
        event_id: EventId,
        score: Score,
    ) -> Result<Event, Error> {
        let mut event = self.event(event_id).await?;
        if event.closing != Some(Closing::Settling(score)) {
            return Err(Error::InvalidState(format!(
                "event {event_id} is not settling with {score}"
            )));
        }
        let remaining = self.pending_bets(event_id).await?.len();
        if remaining > 0 {
            return Err(Error::InvalidState(format!(
                "event {event_id} still has {remaining} pending bets"
            )));
        }
        event.status = EventStatus::Finished;
        event.final_score = Some(score);
        event.closing = None;
        self.insert(Key::Event(event_id), Value::Event(event.clone()));
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(scores: &[(u8, u8)]) -> Vec<BettingOption> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &(home, away))| BettingOption {
                id: i as u64 + 1,
                event_id: 1,
                score: Score::new(home, away),
                profit_bps: 1_000,
            })
            .collect()
    }

    #[test]
    fn test_normal_mode_only_exact_score_wins() {
        let options = options(&[(1, 0), (2, 0), (1, 1)]);
        let outcomes = classify(BetMode::Normal, None, &options, Score::new(2, 0)).unwrap();
        assert_eq!(outcomes[&1], Outcome::Losing);
        assert_eq!(outcomes[&2], Outcome::Winning);
        assert_eq!(outcomes[&3], Outcome::Losing);
    }

    #[test]
    fn test_normal_mode_unlisted_score_everyone_loses() {
        let options = options(&[(1, 0), (2, 0)]);
        let outcomes = classify(BetMode::Normal, None, &options, Score::new(4, 4)).unwrap();
        assert!(outcomes.values().all(|o| *o == Outcome::Losing));
    }

    #[test]
    fn test_inverse_mode_suggested_score_everyone_wins() {
        let options = options(&[(1, 1), (2, 0), (0, 0)]);
        let outcomes = classify(
            BetMode::Inverse,
            Some(Score::new(1, 1)),
            &options,
            Score::new(1, 1),
        )
        .unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.values().all(|o| *o == Outcome::Winning));
    }

    #[test]
    fn test_inverse_mode_matching_option_loses() {
        let options = options(&[(1, 1), (2, 0), (0, 0)]);
        let outcomes = classify(
            BetMode::Inverse,
            Some(Score::new(1, 1)),
            &options,
            Score::new(2, 0),
        )
        .unwrap();
        assert_eq!(outcomes[&1], Outcome::Winning);
        assert_eq!(outcomes[&2], Outcome::Losing);
        assert_eq!(outcomes[&3], Outcome::Winning);
    }

    #[test]
    fn test_inverse_without_suggestion_is_rejected() {
        let options = options(&[(1, 1)]);
        assert!(classify(BetMode::Inverse, None, &options, Score::new(1, 1)).is_err());
    }

    #[test]
    fn test_profit_rounds_down() {
        assert_eq!(profit_for(5_000, 1_000).unwrap(), 500);
        assert_eq!(profit_for(999, 1_250).unwrap(), 124);
        assert_eq!(profit_for(0, 1_000).unwrap(), 0);
        assert!(profit_for(u64::MAX, u32::MAX).is_err());
    }
}
