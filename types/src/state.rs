//! Storage keys and values.
//!
//! Every persisted entity is addressed by a [`Key`] and stored as a [`Value`]. Both carry a
//! one-byte tag so the encoding stays stable as variants are added.

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};

use super::{
    ids_encode_size, read_ids, read_string, string_encode_size, write_ids, write_string,
    BettingOption, BetId, Event, EventId, OptionId, Transaction, User, UserBet, UserId, Wallet,
    Withdrawal, WithdrawalId, MAX_CODE_LENGTH, MAX_INDEX_LENGTH,
};

/// Id sequences kept in state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Sequence {
    User = 0,
    Event = 1,
    BettingOption = 2,
    Bet = 3,
    Withdrawal = 4,
}

impl Write for Sequence {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for Sequence {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::User),
            1 => Ok(Self::Event),
            2 => Ok(Self::BettingOption),
            3 => Ok(Self::Bet),
            4 => Ok(Self::Withdrawal),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for Sequence {
    const SIZE: usize = 1;
}

/// Append-only id lists. Each entry lives under its own [`Key::IndexEntry`] and the list
/// length under [`Key::IndexLength`], so appending touches two small values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Index {
    /// Direct referrals of a user.
    Referrals(UserId),
    EventBets(EventId),
    UserBets(UserId),
    UserWithdrawals(UserId),
}

impl Write for Index {
    fn write(&self, writer: &mut impl BufMut) {
        let (tag, owner) = match self {
            Self::Referrals(id) => (0u8, id),
            Self::EventBets(id) => (1, id),
            Self::UserBets(id) => (2, id),
            Self::UserWithdrawals(id) => (3, id),
        };
        tag.write(writer);
        owner.write(writer);
    }
}

impl Read for Index {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let tag = u8::read(reader)?;
        let owner = u64::read(reader)?;
        match tag {
            0 => Ok(Self::Referrals(owner)),
            1 => Ok(Self::EventBets(owner)),
            2 => Ok(Self::UserBets(owner)),
            3 => Ok(Self::UserWithdrawals(owner)),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for Index {
    const SIZE: usize = u8::SIZE + u64::SIZE;
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    // Accounts (tags 0-4)
    User(UserId),
    InvitationCode(String),
    Wallet(UserId),
    Transaction(UserId, u64),

    // Events (tags 10-14)
    Event(EventId),
    EventOptions(EventId),
    BettingOption(OptionId),
    Bet(BetId),

    // Withdrawals (tag 21)
    Withdrawal(WithdrawalId),

    // Id allocation (tag 30)
    Counter(Sequence),

    // Id lists (tags 40-41)
    IndexLength(Index),
    IndexEntry(Index, u64),
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::User(id) => {
                0u8.write(writer);
                id.write(writer);
            }
            Self::InvitationCode(code) => {
                1u8.write(writer);
                write_string(code, writer);
            }
            Self::Wallet(id) => {
                3u8.write(writer);
                id.write(writer);
            }
            Self::Transaction(user, seq) => {
                4u8.write(writer);
                user.write(writer);
                seq.write(writer);
            }

            Self::Event(id) => {
                10u8.write(writer);
                id.write(writer);
            }
            Self::EventOptions(id) => {
                11u8.write(writer);
                id.write(writer);
            }
            Self::BettingOption(id) => {
                12u8.write(writer);
                id.write(writer);
            }
            Self::Bet(id) => {
                14u8.write(writer);
                id.write(writer);
            }

            Self::Withdrawal(id) => {
                21u8.write(writer);
                id.write(writer);
            }

            Self::Counter(sequence) => {
                30u8.write(writer);
                sequence.write(writer);
            }

            Self::IndexLength(index) => {
                40u8.write(writer);
                index.write(writer);
            }
            Self::IndexEntry(index, position) => {
                41u8.write(writer);
                index.write(writer);
                position.write(writer);
            }
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let key = match u8::read(reader)? {
            0 => Self::User(u64::read(reader)?),
            1 => Self::InvitationCode(read_string(reader, MAX_CODE_LENGTH)?),
            3 => Self::Wallet(u64::read(reader)?),
            4 => Self::Transaction(u64::read(reader)?, u64::read(reader)?),

            10 => Self::Event(u64::read(reader)?),
            11 => Self::EventOptions(u64::read(reader)?),
            12 => Self::BettingOption(u64::read(reader)?),
            14 => Self::Bet(u64::read(reader)?),

            21 => Self::Withdrawal(u64::read(reader)?),

            30 => Self::Counter(Sequence::read(reader)?),

            40 => Self::IndexLength(Index::read(reader)?),
            41 => Self::IndexEntry(Index::read(reader)?, u64::read(reader)?),

            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(key)
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::InvitationCode(code) => string_encode_size(code),
                Self::Transaction(_, _) => 2 * u64::SIZE,
                Self::Counter(_) => Sequence::SIZE,
                Self::IndexLength(_) => Index::SIZE,
                Self::IndexEntry(_, _) => Index::SIZE + u64::SIZE,
                Self::User(_)
                | Self::Wallet(_)
                | Self::Event(_)
                | Self::EventOptions(_)
                | Self::BettingOption(_)
                | Self::Bet(_)
                | Self::Withdrawal(_) => u64::SIZE,
            }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    User(User),
    /// Owner of an invitation code.
    UserId(UserId),
    /// Options of an event.
    Ids(Vec<u64>),
    /// One entry of an [`Index`].
    Id(u64),
    Wallet(Wallet),
    Transaction(Transaction),
    Event(Event),
    BettingOption(BettingOption),
    Bet(UserBet),
    Withdrawal(Withdrawal),
    Counter(u64),
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::User(user) => {
                0u8.write(writer);
                user.write(writer);
            }
            Self::UserId(id) => {
                1u8.write(writer);
                id.write(writer);
            }
            Self::Ids(ids) => {
                2u8.write(writer);
                write_ids(ids, writer);
            }
            Self::Id(id) => {
                5u8.write(writer);
                id.write(writer);
            }
            Self::Wallet(wallet) => {
                3u8.write(writer);
                wallet.write(writer);
            }
            Self::Transaction(entry) => {
                4u8.write(writer);
                entry.write(writer);
            }
            Self::Event(event) => {
                10u8.write(writer);
                event.write(writer);
            }
            Self::BettingOption(option) => {
                11u8.write(writer);
                option.write(writer);
            }
            Self::Bet(bet) => {
                12u8.write(writer);
                bet.write(writer);
            }
            Self::Withdrawal(withdrawal) => {
                20u8.write(writer);
                withdrawal.write(writer);
            }
            Self::Counter(next) => {
                30u8.write(writer);
                next.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = match u8::read(reader)? {
            0 => Self::User(User::read(reader)?),
            1 => Self::UserId(u64::read(reader)?),
            2 => Self::Ids(read_ids(reader, MAX_INDEX_LENGTH)?),
            3 => Self::Wallet(Wallet::read(reader)?),
            4 => Self::Transaction(Transaction::read(reader)?),
            5 => Self::Id(u64::read(reader)?),
            10 => Self::Event(Event::read(reader)?),
            11 => Self::BettingOption(BettingOption::read(reader)?),
            12 => Self::Bet(UserBet::read(reader)?),
            20 => Self::Withdrawal(Withdrawal::read(reader)?),
            30 => Self::Counter(u64::read(reader)?),
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(value)
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::User(user) => user.encode_size(),
                Self::UserId(_) | Self::Id(_) => u64::SIZE,
                Self::Ids(ids) => ids_encode_size(ids),
                Self::Wallet(_) => Wallet::SIZE,
                Self::Transaction(entry) => entry.encode_size(),
                Self::Event(event) => event.encode_size(),
                Self::BettingOption(_) => BettingOption::SIZE,
                Self::Bet(_) => UserBet::SIZE,
                Self::Withdrawal(withdrawal) => withdrawal.encode_size(),
                Self::Counter(_) => u64::SIZE,
            }
    }
}
