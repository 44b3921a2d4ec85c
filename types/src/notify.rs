use serde::Serialize;

use super::{BettingOption, Event, Transaction, User, UserBet, UserId, Wallet, Withdrawal};

/// Entity change published after a successful commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    User(User),
    Wallet(Wallet),
    Transaction(Transaction),
    Event(Event),
    BettingOption(BettingOption),
    Bet(UserBet),
    Withdrawal(Withdrawal),
}

impl Change {
    /// User the change belongs to, if any. Event-level changes are public.
    pub fn user(&self) -> Option<UserId> {
        match self {
            Self::User(user) => Some(user.id),
            Self::Wallet(wallet) => Some(wallet.user_id),
            Self::Transaction(entry) => Some(entry.id.user_id),
            Self::Bet(bet) => Some(bet.user_id),
            Self::Withdrawal(withdrawal) => Some(withdrawal.user_id),
            Self::Event(_) | Self::BettingOption(_) => None,
        }
    }
}
