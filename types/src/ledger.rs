use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    opt_string_encode_size, read_opt_string, read_string, string_encode_size, write_opt_string,
    write_string, MAX_CODE_LENGTH, MAX_PHONE_LENGTH, MAX_TEXT_LENGTH,
};

pub type UserId = u64;
pub type WithdrawalId = u64;

/// A registered account. Referral linkage is fixed at signup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub phone: String,
    pub invitation_code: String,
    pub referred_by: Option<UserId>,
}

impl Write for User {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        write_string(&self.phone, writer);
        write_string(&self.invitation_code, writer);
        self.referred_by.write(writer);
    }
}

impl Read for User {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: u64::read(reader)?,
            phone: read_string(reader, MAX_PHONE_LENGTH)?,
            invitation_code: read_string(reader, MAX_CODE_LENGTH)?,
            referred_by: Option::<u64>::read(reader)?,
        })
    }
}

impl EncodeSize for User {
    fn encode_size(&self) -> usize {
        u64::SIZE
            + string_encode_size(&self.phone)
            + string_encode_size(&self.invitation_code)
            + self.referred_by.encode_size()
    }
}

/// Balance projection for one user.
///
/// Only the ledger mutates a wallet. `total_deposited` never decreases, and
/// `total_invested` is the sum of the user's currently pending stakes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: u64,
    pub total_deposited: u64,
    pub total_withdrawn: u64,
    pub total_invested: u64,
    /// Sequence number assigned to the next ledger entry of this user.
    pub next_txn_seq: u64,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }
}

impl Write for Wallet {
    fn write(&self, writer: &mut impl BufMut) {
        self.user_id.write(writer);
        self.balance.write(writer);
        self.total_deposited.write(writer);
        self.total_withdrawn.write(writer);
        self.total_invested.write(writer);
        self.next_txn_seq.write(writer);
    }
}

impl Read for Wallet {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            user_id: u64::read(reader)?,
            balance: u64::read(reader)?,
            total_deposited: u64::read(reader)?,
            total_withdrawn: u64::read(reader)?,
            total_invested: u64::read(reader)?,
            next_txn_seq: u64::read(reader)?,
        })
    }
}

impl FixedSize for Wallet {
    const SIZE: usize = 6 * u64::SIZE;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TransactionKind {
    Deposit = 0,
    /// Audit entry written when a held withdrawal is approved. Moves no funds.
    Withdrawal = 1,
    WithdrawalHold = 2,
    WithdrawalRefund = 3,
    BetDebit = 4,
    BetWin = 5,
    BetRefund = 6,
    ReferralCommission = 7,
    ManualAdjustment = 8,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::WithdrawalHold => "withdrawal_hold",
            Self::WithdrawalRefund => "withdrawal_refund",
            Self::BetDebit => "bet_debit",
            Self::BetWin => "bet_win",
            Self::BetRefund => "bet_refund",
            Self::ReferralCommission => "referral_commission",
            Self::ManualAdjustment => "manual_adjustment",
        }
    }

    /// Status stamped on entries of this kind. Holds stay `held` in the log
    /// even after resolution; the resolution is its own entry.
    pub fn entry_status(&self) -> TransactionStatus {
        match self {
            Self::WithdrawalHold => TransactionStatus::Held,
            _ => TransactionStatus::Completed,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Write for TransactionKind {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for TransactionKind {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::Deposit),
            1 => Ok(Self::Withdrawal),
            2 => Ok(Self::WithdrawalHold),
            3 => Ok(Self::WithdrawalRefund),
            4 => Ok(Self::BetDebit),
            5 => Ok(Self::BetWin),
            6 => Ok(Self::BetRefund),
            7 => Ok(Self::ReferralCommission),
            8 => Ok(Self::ManualAdjustment),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for TransactionKind {
    const SIZE: usize = 1;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TransactionStatus {
    Completed = 0,
    Held = 1,
}

impl Write for TransactionStatus {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for TransactionStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Completed),
            1 => Ok(Self::Held),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for TransactionStatus {
    const SIZE: usize = 1;
}

/// Ledger entries are numbered per user so appends for different users never contend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub user_id: UserId,
    pub seq: u64,
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.user_id, self.seq)
    }
}

impl Write for TransactionId {
    fn write(&self, writer: &mut impl BufMut) {
        self.user_id.write(writer);
        self.seq.write(writer);
    }
}

impl Read for TransactionId {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            user_id: u64::read(reader)?,
            seq: u64::read(reader)?,
        })
    }
}

impl FixedSize for TransactionId {
    const SIZE: usize = 2 * u64::SIZE;
}

/// Immutable ledger entry. Never updated or deleted once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    /// Nominal amount of the entry. Equals `|delta|` except for approval audit entries.
    pub amount: u64,
    /// Signed balance change applied by this entry.
    pub delta: i64,
    pub balance_before: u64,
    pub balance_after: u64,
    pub status: TransactionStatus,
    pub description: String,
    pub reference: Option<String>,
}

impl Write for Transaction {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        self.kind.write(writer);
        self.amount.write(writer);
        self.delta.write(writer);
        self.balance_before.write(writer);
        self.balance_after.write(writer);
        self.status.write(writer);
        write_string(&self.description, writer);
        write_opt_string(&self.reference, writer);
    }
}

impl Read for Transaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: TransactionId::read(reader)?,
            kind: TransactionKind::read(reader)?,
            amount: u64::read(reader)?,
            delta: i64::read(reader)?,
            balance_before: u64::read(reader)?,
            balance_after: u64::read(reader)?,
            status: TransactionStatus::read(reader)?,
            description: read_string(reader, MAX_TEXT_LENGTH)?,
            reference: read_opt_string(reader, MAX_TEXT_LENGTH)?,
        })
    }
}

impl EncodeSize for Transaction {
    fn encode_size(&self) -> usize {
        TransactionId::SIZE
            + TransactionKind::SIZE
            + u64::SIZE
            + i64::SIZE
            + u64::SIZE
            + u64::SIZE
            + TransactionStatus::SIZE
            + string_encode_size(&self.description)
            + opt_string_encode_size(&self.reference)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WithdrawalStatus {
    Pending = 0,
    Completed = 1,
    Rejected = 2,
}

impl Write for WithdrawalStatus {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for WithdrawalStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Completed),
            2 => Ok(Self::Rejected),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for WithdrawalStatus {
    const SIZE: usize = 1;
}

/// Where an approved withdrawal should be paid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDetails {
    pub method: String,
    pub account: String,
    pub holder: String,
}

impl PayoutDetails {
    /// Returns the name of the first missing or oversized field.
    pub fn invalid_field(&self) -> Option<&'static str> {
        [
            ("method", &self.method),
            ("account", &self.account),
            ("holder", &self.holder),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty() || value.len() > MAX_TEXT_LENGTH)
        .map(|(name, _)| name)
    }
}

impl Write for PayoutDetails {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.method, writer);
        write_string(&self.account, writer);
        write_string(&self.holder, writer);
    }
}

impl Read for PayoutDetails {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            method: read_string(reader, MAX_TEXT_LENGTH)?,
            account: read_string(reader, MAX_TEXT_LENGTH)?,
            holder: read_string(reader, MAX_TEXT_LENGTH)?,
        })
    }
}

impl EncodeSize for PayoutDetails {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.method)
            + string_encode_size(&self.account)
            + string_encode_size(&self.holder)
    }
}

/// A withdrawal request. Funds are held from the wallet when the request is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub amount: u64,
    pub fee: u64,
    pub net_amount: u64,
    pub status: WithdrawalStatus,
    pub payout: PayoutDetails,
    pub notes: Option<String>,
    /// Ledger entry that placed the hold.
    pub hold: TransactionId,
}

impl Write for Withdrawal {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        self.user_id.write(writer);
        self.amount.write(writer);
        self.fee.write(writer);
        self.net_amount.write(writer);
        self.status.write(writer);
        self.payout.write(writer);
        write_opt_string(&self.notes, writer);
        self.hold.write(writer);
    }
}

impl Read for Withdrawal {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: u64::read(reader)?,
            user_id: u64::read(reader)?,
            amount: u64::read(reader)?,
            fee: u64::read(reader)?,
            net_amount: u64::read(reader)?,
            status: WithdrawalStatus::read(reader)?,
            payout: PayoutDetails::read(reader)?,
            notes: read_opt_string(reader, MAX_TEXT_LENGTH)?,
            hold: TransactionId::read(reader)?,
        })
    }
}

impl EncodeSize for Withdrawal {
    fn encode_size(&self) -> usize {
        5 * u64::SIZE
            + WithdrawalStatus::SIZE
            + self.payout.encode_size()
            + opt_string_encode_size(&self.notes)
            + TransactionId::SIZE
    }
}
