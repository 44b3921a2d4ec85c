use super::*;
use crate::error::signed;
use marcador_types::{
    BetMode, BetStatus, Closing, EventStatus, PayoutDetails, Score, Transaction, TransactionId,
    TransactionKind, WithdrawalStatus, BPS_SCALE, INVITATION_CODE_OFFSET, MAX_CODE_LENGTH,
    MAX_NAME_LENGTH, MAX_PHONE_LENGTH, MAX_TEXT_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

mod accounts;
mod betting;
mod cancellation;
mod events;
mod ledger;
mod settlement;
mod withdrawal;

pub use cancellation::BetRefund;
pub use events::{EventDraft, OptionDraft};
pub use ledger::Memo;
pub use settlement::{classify, profit_for, BetSettlement, Outcome};
pub(crate) use settlement::{PendingBet, SettlementPlan};
