use super::*;

impl<'a, S: State> Layer<'a, S> {
    /// Places a hold for `amount` if the user's VIP tier allows it, and records a pending
    /// withdrawal.
    pub(crate) async fn handle_request_withdrawal(
        &mut self,
        user_id: UserId,
        amount: u64,
        payout: PayoutDetails,
    ) -> Result<Withdrawal, Error> {
        if amount == 0 {
            return Err(Error::Validation(
                "withdrawal amount must be positive".to_string(),
            ));
        }
        if let Some(field) = payout.invalid_field() {
            return Err(Error::Validation(format!("invalid payout {field}")));
        }

        let wallet = self.wallet(user_id).await?;
        let vip = self
            .config
            .vip
            .status(wallet.total_deposited, wallet.balance);
        let insufficient = Error::InsufficientFunds {
            requested: amount,
            available: vip.max_withdrawal,
        };
        if amount >= wallet.balance || amount > vip.max_withdrawal {
            debug!(
                user_id,
                amount,
                balance = wallet.balance,
                floor = vip.min_balance_required,
                tier = %vip.tier.name,
                "withdrawal over limit"
            );
            return Err(insufficient);
        }
        if wallet.balance - amount < vip.min_balance_required {
            return Err(insufficient);
        }

        let fee = apply_fee(amount, self.config.withdrawal_fee_bps);
        let id = self.next_id(Sequence::Withdrawal).await?;
        let (_, hold) = self
            .apply_mutation(
                user_id,
                -signed(amount)?,
                TransactionKind::WithdrawalHold,
                Memo::new(format!("withdrawal hold via {}", payout.method))
                    .with_reference(format!("withdrawal:{id}")),
            )
            .await?;

        let withdrawal = Withdrawal {
            id,
            user_id,
            amount,
            fee,
            net_amount: amount - fee,
            status: WithdrawalStatus::Pending,
            payout,
            notes: None,
            hold,
        };
        self.insert(Key::Withdrawal(id), Value::Withdrawal(withdrawal.clone()));
        self.push_index(Index::UserWithdrawals(user_id), id).await?;
        Ok(withdrawal)
    }

    /// Completes a pending withdrawal. The held funds already left the balance, so the
    /// ledger only records a zero-delta audit entry.
    pub(crate) async fn handle_approve_withdrawal(
        &mut self,
        id: WithdrawalId,
    ) -> Result<Withdrawal, Error> {
        let mut withdrawal = self.pending_withdrawal(id).await?;
        self.apply_mutation(
            withdrawal.user_id,
            0,
            TransactionKind::Withdrawal,
            Memo::new(format!(
                "withdrawal paid ({} net after {} fee)",
                withdrawal.net_amount, withdrawal.fee
            ))
            .with_reference(format!("withdrawal:{id}"))
            .with_nominal(withdrawal.amount),
        )
        .await?;
        withdrawal.status = WithdrawalStatus::Completed;
        self.insert(Key::Withdrawal(id), Value::Withdrawal(withdrawal.clone()));
        Ok(withdrawal)
    }

    /// Rejects a pending withdrawal and returns the held amount to the balance.
    pub(crate) async fn handle_reject_withdrawal(
        &mut self,
        id: WithdrawalId,
        reason: &str,
    ) -> Result<Withdrawal, Error> {
        let reason = reason.trim();
        if reason.is_empty() || reason.len() > MAX_TEXT_LENGTH {
            return Err(Error::Validation(format!(
                "rejection reason must be 1..={MAX_TEXT_LENGTH} characters"
            )));
        }
        let mut withdrawal = self.pending_withdrawal(id).await?;
        self.apply_mutation(
            withdrawal.user_id,
            signed(withdrawal.amount)?,
            TransactionKind::WithdrawalRefund,
            Memo::new("withdrawal rejected")
                .with_reference(format!("withdrawal:{id}")),
        )
        .await?;
        withdrawal.status = WithdrawalStatus::Rejected;
        withdrawal.notes = Some(reason.to_string());
        self.insert(Key::Withdrawal(id), Value::Withdrawal(withdrawal.clone()));
        Ok(withdrawal)
    }

    async fn pending_withdrawal(&mut self, id: WithdrawalId) -> Result<Withdrawal, Error> {
        let withdrawal = self.withdrawal(id).await?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(Error::InvalidState(format!(
                "withdrawal {id} is {:?}",
                withdrawal.status
            )));
        }
        Ok(withdrawal)
    }
}

fn apply_fee(amount: u64, fee_bps: u16) -> u64 {
    ((amount as u128) * (fee_bps as u128) / (BPS_SCALE as u128)) as u64
}
