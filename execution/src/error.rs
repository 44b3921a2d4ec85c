use marcador_types::{BetId, EventId, OptionId, UserId, WithdrawalId};
use std::fmt;
use thiserror::Error as ThisError;

/// Entity a lookup failed to find.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Missing {
    User(UserId),
    Wallet(UserId),
    InvitationCode(String),
    Event(EventId),
    BettingOption(OptionId),
    Bet(BetId),
    Withdrawal(WithdrawalId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Wallet(id) => write!(f, "wallet of user {id}"),
            Self::InvitationCode(code) => write!(f, "invitation code {code:?}"),
            Self::Event(id) => write!(f, "event {id}"),
            Self::BettingOption(id) => write!(f, "betting option {id}"),
            Self::Bet(id) => write!(f, "bet {id}"),
            Self::Withdrawal(id) => write!(f, "withdrawal {id}"),
        }
    }
}

#[derive(Debug, ThisError)]
pub enum Error {
    /// A debit exceeds the balance, or would break the VIP retained-balance floor.
    #[error("insufficient funds (requested={requested}, available={available})")]
    InsufficientFunds { requested: u64, available: u64 },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("event {0} already settled")]
    AlreadySettled(EventId),
    #[error("{0} not found")]
    NotFound(Missing),
    #[error("validation failed: {0}")]
    Validation(String),
    /// Another commit changed data this operation read. Retried internally.
    #[error("concurrent modification")]
    Conflict,
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InvalidState(_) => "invalid_state",
            Self::AlreadySettled(_) => "already_settled",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Conflict => "conflict",
            Self::Storage(_) => "storage_error",
        }
    }
}

/// Converts an unsigned amount into a signed ledger delta.
pub(crate) fn signed(amount: u64) -> Result<i64, Error> {
    i64::try_from(amount).map_err(|_| Error::Validation(format!("amount {amount} too large")))
}
