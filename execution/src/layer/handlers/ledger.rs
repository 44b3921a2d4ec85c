use super::*;

/// Descriptive fields of a ledger entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
    /// Amount recorded on zero-delta audit entries.
    #[serde(default)]
    pub nominal: Option<u64>,
}

impl Memo {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_nominal(mut self, amount: u64) -> Self {
        self.nominal = Some(amount);
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if self.description.len() > MAX_TEXT_LENGTH {
            return Err(Error::Validation("description too long".to_string()));
        }
        if self
            .reference
            .as_ref()
            .is_some_and(|reference| reference.len() > MAX_TEXT_LENGTH)
        {
            return Err(Error::Validation("reference too long".to_string()));
        }
        Ok(())
    }
}

/// Checks that the sign of `delta` matches what `kind` is allowed to do to a balance.
fn check_direction(kind: TransactionKind, delta: i64, memo: &Memo) -> Result<(), Error> {
    let ok = match kind {
        TransactionKind::Deposit
        | TransactionKind::WithdrawalRefund
        | TransactionKind::BetWin
        | TransactionKind::BetRefund
        | TransactionKind::ReferralCommission => delta > 0,
        TransactionKind::WithdrawalHold | TransactionKind::BetDebit => delta < 0,
        TransactionKind::Withdrawal => delta == 0 && memo.nominal.is_some_and(|n| n > 0),
        TransactionKind::ManualAdjustment => delta != 0,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "delta {delta} not allowed for {kind} entries"
        )))
    }
}

impl<'a, S: State> Layer<'a, S> {
    /// Applies a signed change to a user's balance and appends the matching ledger entry.
    ///
    /// Debits never take the balance below zero; they fail with
    /// [`Error::InsufficientFunds`] instead. Returns the new balance and the entry id.
    pub(crate) async fn apply_mutation(
        &mut self,
        user_id: UserId,
        delta: i64,
        kind: TransactionKind,
        memo: Memo,
    ) -> Result<(u64, TransactionId), Error> {
        memo.validate()?;
        check_direction(kind, delta, &memo)?;

        let mut wallet = self.wallet(user_id).await?;
        let before = wallet.balance;
        let after = if delta >= 0 {
            before.checked_add(delta.unsigned_abs()).ok_or_else(|| {
                Error::InvalidState(format!("balance of user {user_id} would overflow"))
            })?
        } else {
            let debit = delta.unsigned_abs();
            before
                .checked_sub(debit)
                .ok_or(Error::InsufficientFunds {
                    requested: debit,
                    available: before,
                })?
        };

        let amount = memo.nominal.unwrap_or(delta.unsigned_abs());
        match kind {
            TransactionKind::Deposit => {
                wallet.total_deposited = wallet.total_deposited.saturating_add(amount);
            }
            TransactionKind::Withdrawal => {
                wallet.total_withdrawn = wallet.total_withdrawn.saturating_add(amount);
            }
            _ => {}
        }

        let id = TransactionId {
            user_id,
            seq: wallet.next_txn_seq,
        };
        wallet.next_txn_seq += 1;
        wallet.balance = after;

        let entry = Transaction {
            id,
            kind,
            amount,
            delta,
            balance_before: before,
            balance_after: after,
            status: kind.entry_status(),
            description: memo.description,
            reference: memo.reference,
        };
        debug!(
            user_id,
            %kind,
            delta,
            balance_before = before,
            balance_after = after,
            "ledger entry staged"
        );
        self.insert(Key::Wallet(user_id), Value::Wallet(wallet));
        self.insert(Key::Transaction(user_id, id.seq), Value::Transaction(entry));
        Ok((after, id))
    }

    /// Moves the user's outstanding-stake aggregate by `delta`.
    pub(crate) async fn adjust_invested(
        &mut self,
        user_id: UserId,
        delta: i64,
    ) -> Result<(), Error> {
        let mut wallet = self.wallet(user_id).await?;
        wallet.total_invested = if delta >= 0 {
            wallet.total_invested.saturating_add(delta.unsigned_abs())
        } else {
            wallet
                .total_invested
                .checked_sub(delta.unsigned_abs())
                .ok_or_else(|| {
                    Error::InvalidState(format!(
                        "outstanding stakes of user {user_id} would go negative"
                    ))
                })?
        };
        self.insert(Key::Wallet(user_id), Value::Wallet(wallet));
        Ok(())
    }

    pub(crate) async fn transaction(
        &mut self,
        user_id: UserId,
        seq: u64,
    ) -> Result<Option<Transaction>, Error> {
        let key = Key::Transaction(user_id, seq);
        match self.get(&key).await? {
            Some(Value::Transaction(entry)) => Ok(Some(entry)),
            None => Ok(None),
            Some(other) => Err(corrupt(key, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Memory;

    async fn store_with_wallet(balance: u64) -> Memory {
        let mut store = Memory::default();
        let wallet = Wallet {
            balance,
            ..Wallet::new(1)
        };
        store
            .insert(Key::Wallet(1), Value::Wallet(wallet))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_credit_and_debit_append_entries() {
        let store = store_with_wallet(0).await;
        let config = EngineConfig::default();
        let mut layer = Layer::new(&store, &config);

        let (balance, first) = layer
            .apply_mutation(1, 15_000, TransactionKind::Deposit, Memo::new("deposit"))
            .await
            .unwrap();
        assert_eq!(balance, 15_000);
        let (balance, second) = layer
            .apply_mutation(
                1,
                -5_000,
                TransactionKind::BetDebit,
                Memo::new("stake").with_reference("bet:1"),
            )
            .await
            .unwrap();
        assert_eq!(balance, 10_000);
        assert_eq!((first.seq, second.seq), (0, 1));

        let wallet = layer.wallet(1).await.unwrap();
        assert_eq!(wallet.total_deposited, 15_000);
        assert_eq!(wallet.next_txn_seq, 2);
        let entry = layer.transaction(1, 1).await.unwrap().unwrap();
        assert_eq!(entry.delta, -5_000);
        assert_eq!(entry.amount, 5_000);
        assert_eq!((entry.balance_before, entry.balance_after), (15_000, 10_000));
        assert_eq!(entry.reference.as_deref(), Some("bet:1"));
    }

    #[tokio::test]
    async fn test_debit_beyond_balance_is_rejected() {
        let store = store_with_wallet(300).await;
        let config = EngineConfig::default();
        let mut layer = Layer::new(&store, &config);

        let result = layer
            .apply_mutation(1, -301, TransactionKind::BetDebit, Memo::new("stake"))
            .await;
        assert!(matches!(
            result,
            Err(Error::InsufficientFunds {
                requested: 301,
                available: 300
            })
        ));
        assert_eq!(layer.wallet(1).await.unwrap().balance, 300);

        // Draining to exactly zero is allowed.
        let (balance, _) = layer
            .apply_mutation(1, -300, TransactionKind::BetDebit, Memo::new("stake"))
            .await
            .unwrap();
        assert_eq!(balance, 0);
    }

    #[tokio::test]
    async fn test_kind_and_direction_must_agree() {
        let store = store_with_wallet(1_000).await;
        let config = EngineConfig::default();
        let mut layer = Layer::new(&store, &config);

        for (delta, kind) in [
            (-10, TransactionKind::Deposit),
            (10, TransactionKind::BetDebit),
            (0, TransactionKind::ManualAdjustment),
            (0, TransactionKind::Withdrawal),
        ] {
            let result = layer.apply_mutation(1, delta, kind, Memo::new("x")).await;
            assert!(matches!(result, Err(Error::Validation(_))), "{kind}");
        }
    }

    #[tokio::test]
    async fn test_withdrawal_audit_entry_keeps_balance() {
        let store = store_with_wallet(1_000).await;
        let config = EngineConfig::default();
        let mut layer = Layer::new(&store, &config);

        let (balance, id) = layer
            .apply_mutation(
                1,
                0,
                TransactionKind::Withdrawal,
                Memo::new("withdrawal paid").with_nominal(400),
            )
            .await
            .unwrap();
        assert_eq!(balance, 1_000);
        let wallet = layer.wallet(1).await.unwrap();
        assert_eq!(wallet.total_withdrawn, 400);
        let entry = layer.transaction(1, id.seq).await.unwrap().unwrap();
        assert_eq!((entry.amount, entry.delta), (400, 0));
    }

    #[tokio::test]
    async fn test_invested_cannot_go_negative() {
        let store = store_with_wallet(1_000).await;
        let config = EngineConfig::default();
        let mut layer = Layer::new(&store, &config);

        layer.adjust_invested(1, 200).await.unwrap();
        layer.adjust_invested(1, -200).await.unwrap();
        assert!(matches!(
            layer.adjust_invested(1, -1).await,
            Err(Error::InvalidState(_))
        ));
    }
}
