use anyhow::anyhow;
use marcador_types::{
    BetId, BettingOption, Change, Event, EventId, Index, Key, OptionId, Sequence, User, UserBet,
    UserId, Value, Wallet, Withdrawal, WithdrawalId,
};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    state::{State, Status},
    EngineConfig, Error, Missing,
};

mod handlers;

pub use handlers::{
    classify, profit_for, BetRefund, BetSettlement, EventDraft, Memo, OptionDraft, Outcome,
};
pub(crate) use handlers::{PendingBet, SettlementPlan};

/// Staged changes of one engine operation, ready to be validated and written.
pub(crate) struct Commit {
    /// Every key the operation read, with the value it saw.
    pub guards: Vec<(Key, Option<Value>)>,
    pub changes: Vec<(Key, Status)>,
    pub notifications: Vec<Change>,
}

/// Overlay over a [`State`] that buffers writes until [`Layer::commit`].
///
/// Dropping a layer without committing discards every staged write, so an operation that
/// fails halfway leaves storage untouched.
pub(crate) struct Layer<'a, S: State> {
    state: &'a S,
    config: &'a EngineConfig,
    pending: BTreeMap<Key, Status>,
    observed: BTreeMap<Key, Option<Value>>,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(state: &'a S, config: &'a EngineConfig) -> Self {
        Self {
            state,
            config,
            pending: BTreeMap::new(),
            observed: BTreeMap::new(),
        }
    }

    async fn get(&mut self, key: &Key) -> Result<Option<Value>, Error> {
        if let Some(status) = self.pending.get(key) {
            return Ok(match status {
                Status::Update(value) => Some(value.clone()),
                Status::Delete => None,
            });
        }
        if let Some(value) = self.observed.get(key) {
            return Ok(value.clone());
        }
        let value = self.state.get(key).await?;
        self.observed.insert(key.clone(), value.clone());
        Ok(value)
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    pub fn commit(self) -> Commit {
        let notifications = self
            .pending
            .values()
            .filter_map(|status| match status {
                Status::Update(value) => change_for(value),
                Status::Delete => None,
            })
            .collect();
        debug!(
            reads = self.observed.len(),
            writes = self.pending.len(),
            "layer committed"
        );
        Commit {
            guards: self.observed.into_iter().collect(),
            changes: self.pending.into_iter().collect(),
            notifications,
        }
    }

    pub async fn user(&mut self, id: UserId) -> Result<User, Error> {
        match self.get(&Key::User(id)).await? {
            Some(Value::User(user)) => Ok(user),
            None => Err(Error::NotFound(Missing::User(id))),
            Some(other) => Err(corrupt(Key::User(id), &other)),
        }
    }

    pub async fn wallet(&mut self, user_id: UserId) -> Result<Wallet, Error> {
        match self.get(&Key::Wallet(user_id)).await? {
            Some(Value::Wallet(wallet)) => Ok(wallet),
            None => Err(Error::NotFound(Missing::Wallet(user_id))),
            Some(other) => Err(corrupt(Key::Wallet(user_id), &other)),
        }
    }

    pub async fn event(&mut self, id: EventId) -> Result<Event, Error> {
        match self.get(&Key::Event(id)).await? {
            Some(Value::Event(event)) => Ok(event),
            None => Err(Error::NotFound(Missing::Event(id))),
            Some(other) => Err(corrupt(Key::Event(id), &other)),
        }
    }

    pub async fn option(&mut self, id: OptionId) -> Result<BettingOption, Error> {
        match self.get(&Key::BettingOption(id)).await? {
            Some(Value::BettingOption(option)) => Ok(option),
            None => Err(Error::NotFound(Missing::BettingOption(id))),
            Some(other) => Err(corrupt(Key::BettingOption(id), &other)),
        }
    }

    pub async fn bet(&mut self, id: BetId) -> Result<UserBet, Error> {
        match self.get(&Key::Bet(id)).await? {
            Some(Value::Bet(bet)) => Ok(bet),
            None => Err(Error::NotFound(Missing::Bet(id))),
            Some(other) => Err(corrupt(Key::Bet(id), &other)),
        }
    }

    pub async fn withdrawal(&mut self, id: WithdrawalId) -> Result<Withdrawal, Error> {
        match self.get(&Key::Withdrawal(id)).await? {
            Some(Value::Withdrawal(withdrawal)) => Ok(withdrawal),
            None => Err(Error::NotFound(Missing::Withdrawal(id))),
            Some(other) => Err(corrupt(Key::Withdrawal(id), &other)),
        }
    }

    /// Loads an id list value. Missing lists are empty.
    pub async fn ids(&mut self, key: Key) -> Result<Vec<u64>, Error> {
        match self.get(&key).await? {
            Some(Value::Ids(ids)) => Ok(ids),
            None => Ok(Vec::new()),
            Some(other) => Err(corrupt(key, &other)),
        }
    }

    /// Number of entries appended to an index.
    pub async fn index_len(&mut self, index: Index) -> Result<u64, Error> {
        let key = Key::IndexLength(index);
        match self.get(&key).await? {
            Some(Value::Counter(len)) => Ok(len),
            None => Ok(0),
            Some(other) => Err(corrupt(key, &other)),
        }
    }

    /// Every id of an index, in insertion order.
    pub async fn index(&mut self, index: Index) -> Result<Vec<u64>, Error> {
        let len = self.index_len(index).await?;
        let mut ids = Vec::new();
        for position in 0..len {
            let key = Key::IndexEntry(index, position);
            match self.get(&key).await? {
                Some(Value::Id(id)) => ids.push(id),
                None => {
                    return Err(Error::Storage(anyhow!(
                        "{index:?} is missing entry {position} of {len}"
                    )))
                }
                Some(other) => return Err(corrupt(key, &other)),
            }
        }
        Ok(ids)
    }

    async fn push_index(&mut self, index: Index, id: u64) -> Result<(), Error> {
        let position = self.index_len(index).await?;
        let len = position
            .checked_add(1)
            .ok_or_else(|| Error::InvalidState(format!("{index:?} is full")))?;
        self.insert(Key::IndexEntry(index, position), Value::Id(id));
        self.insert(Key::IndexLength(index), Value::Counter(len));
        Ok(())
    }

    /// Last id allocated from a sequence, if any.
    pub async fn counter(&mut self, sequence: Sequence) -> Result<Option<u64>, Error> {
        let key = Key::Counter(sequence);
        match self.get(&key).await? {
            Some(Value::Counter(value)) => Ok(Some(value)),
            None => Ok(None),
            Some(other) => Err(corrupt(key, &other)),
        }
    }

    /// Allocates the next id of a sequence. Ids start at 1.
    async fn next_id(&mut self, sequence: Sequence) -> Result<u64, Error> {
        let current = self.counter(sequence).await?.unwrap_or(0);
        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::InvalidState(format!("{sequence:?} ids exhausted")))?;
        self.insert(Key::Counter(sequence), Value::Counter(next));
        Ok(next)
    }
}

fn corrupt(key: Key, found: &Value) -> Error {
    Error::Storage(anyhow!("unexpected value under {key:?}: {found:?}"))
}

fn change_for(value: &Value) -> Option<Change> {
    match value {
        Value::User(user) => Some(Change::User(user.clone())),
        Value::Wallet(wallet) => Some(Change::Wallet(wallet.clone())),
        Value::Transaction(entry) => Some(Change::Transaction(entry.clone())),
        Value::Event(event) => Some(Change::Event(event.clone())),
        Value::BettingOption(option) => Some(Change::BettingOption(option.clone())),
        Value::Bet(bet) => Some(Change::Bet(bet.clone())),
        Value::Withdrawal(withdrawal) => Some(Change::Withdrawal(withdrawal.clone())),
        Value::UserId(_) | Value::Ids(_) | Value::Id(_) | Value::Counter(_) => None,
    }
}
