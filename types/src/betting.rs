use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

use super::{read_string, string_encode_size, write_string, UserId, MAX_NAME_LENGTH};

pub type EventId = u64;
pub type OptionId = u64;
pub type BetId = u64;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum ScoreError {
    #[error("score must look like \"home-away\" (got {0:?})")]
    Malformed(String),
    #[error("goal count out of range in {0:?}")]
    OutOfRange(String),
}

/// Final (or predicted) score of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score {
    pub home: u8,
    pub away: u8,
}

impl Score {
    pub const fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }

    /// Every score with at most `max_goals` per side, home-major.
    pub fn catalog(max_goals: u8) -> Vec<Score> {
        (0..=max_goals)
            .flat_map(|home| (0..=max_goals).map(move |away| Score::new(home, away)))
            .collect()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

impl FromStr for Score {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (home, away) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| ScoreError::Malformed(s.to_string()))?;
        let parse = |part: &str| {
            let part = part.trim();
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ScoreError::Malformed(s.to_string()));
            }
            part.parse::<u8>()
                .map_err(|_| ScoreError::OutOfRange(s.to_string()))
        };
        Ok(Score::new(parse(home)?, parse(away)?))
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Write for Score {
    fn write(&self, writer: &mut impl BufMut) {
        self.home.write(writer);
        self.away.write(writer);
    }
}

impl Read for Score {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            home: u8::read(reader)?,
            away: u8::read(reader)?,
        })
    }
}

impl FixedSize for Score {
    const SIZE: usize = 2;
}

/// How winners are picked at settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BetMode {
    /// Bettors predicting the real outcome win.
    Normal = 0,
    /// Bettors predicting the real outcome lose, unless it matches the
    /// suggested score, in which case everyone wins.
    Inverse = 1,
}

impl Write for BetMode {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for BetMode {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Inverse),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for BetMode {
    const SIZE: usize = 1;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EventStatus {
    Active = 0,
    Finished = 1,
    Cancelled = 2,
}

impl Write for EventStatus {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for EventStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Active),
            1 => Ok(Self::Finished),
            2 => Ok(Self::Cancelled),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for EventStatus {
    const SIZE: usize = 1;
}

/// Closing intent recorded on an active event before any of its bets are touched.
///
/// While set, the event accepts no new bets, and only a run with the same
/// intent may resume it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "score", rename_all = "snake_case")]
pub enum Closing {
    Settling(Score),
    Cancelling,
}

impl Write for Closing {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Settling(score) => {
                0u8.write(writer);
                score.write(writer);
            }
            Self::Cancelling => 1u8.write(writer),
        }
    }
}

impl Read for Closing {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Settling(Score::read(reader)?)),
            1 => Ok(Self::Cancelling),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl EncodeSize for Closing {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Settling(_) => Score::SIZE,
                Self::Cancelling => 0,
            }
    }
}

/// A wager subject. Created active; becomes finished or cancelled exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub home: String,
    pub away: String,
    /// Caller-supplied kickoff time (unix ms).
    pub scheduled_at: u64,
    pub status: EventStatus,
    pub mode: BetMode,
    /// Publicly advertised "likely" score. Required for inverse events.
    pub suggested_score: Option<Score>,
    pub final_score: Option<Score>,
    pub closing: Option<Closing>,
}

impl Event {
    pub fn accepts_bets(&self) -> bool {
        self.status == EventStatus::Active && self.closing.is_none()
    }
}

impl Write for Event {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        write_string(&self.home, writer);
        write_string(&self.away, writer);
        self.scheduled_at.write(writer);
        self.status.write(writer);
        self.mode.write(writer);
        self.suggested_score.write(writer);
        self.final_score.write(writer);
        self.closing.write(writer);
    }
}

impl Read for Event {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: u64::read(reader)?,
            home: read_string(reader, MAX_NAME_LENGTH)?,
            away: read_string(reader, MAX_NAME_LENGTH)?,
            scheduled_at: u64::read(reader)?,
            status: EventStatus::read(reader)?,
            mode: BetMode::read(reader)?,
            suggested_score: Option::<Score>::read(reader)?,
            final_score: Option::<Score>::read(reader)?,
            closing: Option::<Closing>::read(reader)?,
        })
    }
}

impl EncodeSize for Event {
    fn encode_size(&self) -> usize {
        u64::SIZE
            + string_encode_size(&self.home)
            + string_encode_size(&self.away)
            + u64::SIZE
            + EventStatus::SIZE
            + BetMode::SIZE
            + self.suggested_score.encode_size()
            + self.final_score.encode_size()
            + self.closing.encode_size()
    }
}

/// One candidate score of an event. The payout rate lives here, not on the event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BettingOption {
    pub id: OptionId,
    pub event_id: EventId,
    pub score: Score,
    /// Profit paid on a winning stake, in basis points of the stake.
    pub profit_bps: u32,
}

impl Write for BettingOption {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        self.event_id.write(writer);
        self.score.write(writer);
        self.profit_bps.write(writer);
    }
}

impl Read for BettingOption {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: u64::read(reader)?,
            event_id: u64::read(reader)?,
            score: Score::read(reader)?,
            profit_bps: u32::read(reader)?,
        })
    }
}

impl FixedSize for BettingOption {
    const SIZE: usize = 2 * u64::SIZE + Score::SIZE + u32::SIZE;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BetStatus {
    Pending = 0,
    Won = 1,
    Lost = 2,
    Cancelled = 3,
}

impl Write for BetStatus {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for BetStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Won),
            2 => Ok(Self::Lost),
            3 => Ok(Self::Cancelled),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for BetStatus {
    const SIZE: usize = 1;
}

/// A stake on one betting option. Leaves `pending` exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBet {
    pub id: BetId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub option_id: OptionId,
    pub amount: u64,
    pub potential_profit: u64,
    pub status: BetStatus,
    pub actual_profit: u64,
    pub total_return: u64,
}

impl Write for UserBet {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        self.user_id.write(writer);
        self.event_id.write(writer);
        self.option_id.write(writer);
        self.amount.write(writer);
        self.potential_profit.write(writer);
        self.status.write(writer);
        self.actual_profit.write(writer);
        self.total_return.write(writer);
    }
}

impl Read for UserBet {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: u64::read(reader)?,
            user_id: u64::read(reader)?,
            event_id: u64::read(reader)?,
            option_id: u64::read(reader)?,
            amount: u64::read(reader)?,
            potential_profit: u64::read(reader)?,
            status: BetStatus::read(reader)?,
            actual_profit: u64::read(reader)?,
            total_return: u64::read(reader)?,
        })
    }
}

impl FixedSize for UserBet {
    const SIZE: usize = 8 * u64::SIZE + BetStatus::SIZE;
}
