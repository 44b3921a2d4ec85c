use super::*;

/// Renders the invitation code of a user id: upper-case base 36 of the offset id.
pub(crate) fn invitation_code_for(user_id: UserId) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut value = user_id.saturating_add(INVITATION_CODE_OFFSET);
    let mut code = Vec::new();
    while value > 0 {
        code.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    code.reverse();
    String::from_utf8_lossy(&code).into_owned()
}

fn normalize_code(code: &str) -> Result<String, Error> {
    let code = code.trim().to_ascii_uppercase();
    if code.is_empty() || code.len() > MAX_CODE_LENGTH {
        return Err(Error::Validation("malformed invitation code".to_string()));
    }
    Ok(code)
}

impl<'a, S: State> Layer<'a, S> {
    /// Creates a user with an empty wallet, linking it to the owner of `invitation_code`.
    pub(crate) async fn handle_register_user(
        &mut self,
        phone: &str,
        invitation_code: Option<&str>,
    ) -> Result<User, Error> {
        let phone = phone.trim();
        if phone.is_empty() || phone.len() > MAX_PHONE_LENGTH {
            return Err(Error::Validation(format!(
                "phone must be 1..={MAX_PHONE_LENGTH} characters"
            )));
        }

        let referred_by = match invitation_code {
            Some(code) => {
                let code = normalize_code(code)?;
                match self.get(&Key::InvitationCode(code.clone())).await? {
                    Some(Value::UserId(owner)) => Some(owner),
                    None => return Err(Error::NotFound(Missing::InvitationCode(code))),
                    Some(other) => return Err(corrupt(Key::InvitationCode(code), &other)),
                }
            }
            None => None,
        };

        let id = self.next_id(Sequence::User).await?;
        let code = invitation_code_for(id);
        if self.get(&Key::InvitationCode(code.clone())).await?.is_some() {
            return Err(Error::InvalidState(format!(
                "invitation code {code} already assigned"
            )));
        }

        let user = User {
            id,
            phone: phone.to_string(),
            invitation_code: code.clone(),
            referred_by,
        };
        self.insert(Key::User(id), Value::User(user.clone()));
        self.insert(Key::InvitationCode(code), Value::UserId(id));
        self.insert(Key::Wallet(id), Value::Wallet(Wallet::new(id)));
        if let Some(referrer) = referred_by {
            self.push_index(Index::Referrals(referrer), id).await?;
        }
        Ok(user)
    }

    pub(crate) async fn referral_count(&mut self, user_id: UserId) -> Result<u32, Error> {
        self.user(user_id).await?;
        let referrals = self.index_len(Index::Referrals(user_id)).await?;
        Ok(u32::try_from(referrals).unwrap_or(u32::MAX))
    }

    pub(crate) async fn handle_deposit(
        &mut self,
        user_id: UserId,
        amount: u64,
        reference: Option<&str>,
    ) -> Result<(u64, TransactionId), Error> {
        if amount == 0 {
            return Err(Error::Validation("deposit amount must be positive".to_string()));
        }
        let mut memo = Memo::new("deposit");
        if let Some(reference) = reference {
            memo = memo.with_reference(reference);
        }
        self.apply_mutation(user_id, signed(amount)?, TransactionKind::Deposit, memo)
            .await
    }

    /// Credits a referral commission that was computed off-ledger.
    pub(crate) async fn handle_commission(
        &mut self,
        user_id: UserId,
        amount: u64,
        reference: Option<&str>,
    ) -> Result<(u64, TransactionId), Error> {
        if amount == 0 {
            return Err(Error::Validation(
                "commission amount must be positive".to_string(),
            ));
        }
        let mut memo = Memo::new("referral commission");
        if let Some(reference) = reference {
            memo = memo.with_reference(reference);
        }
        self.apply_mutation(
            user_id,
            signed(amount)?,
            TransactionKind::ReferralCommission,
            memo,
        )
        .await
    }

    pub(crate) async fn handle_adjustment(
        &mut self,
        user_id: UserId,
        delta: i64,
        description: &str,
    ) -> Result<(u64, TransactionId), Error> {
        let description = description.trim();
        if description.is_empty() {
            return Err(Error::Validation(
                "manual adjustments need a description".to_string(),
            ));
        }
        self.apply_mutation(
            user_id,
            delta,
            TransactionKind::ManualAdjustment,
            Memo::new(description),
        )
        .await
    }
}
