//! Test helpers: a fault-injecting store and engine fixtures.

use crate::{Engine, EngineConfig, Memory, State, Status};
use anyhow::{bail, Result};
use marcador_types::{Key, PayoutDetails, UserId, Value};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

/// Shared switch that makes a [`Faulty`] store refuse batches touching chosen wallets.
#[derive(Clone, Default)]
pub struct Faults {
    wallets: Arc<Mutex<HashSet<UserId>>>,
}

impl Faults {
    pub fn fail_wallet(&self, user_id: UserId) {
        self.wallets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id);
    }

    pub fn heal_wallet(&self, user_id: UserId) {
        self.wallets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id);
    }

    fn tripped(&self, changes: &[(Key, Status)]) -> Option<UserId> {
        let wallets = self.wallets.lock().unwrap_or_else(PoisonError::into_inner);
        changes.iter().find_map(|(key, _)| match key {
            Key::Wallet(user_id) if wallets.contains(user_id) => Some(*user_id),
            _ => None,
        })
    }
}

/// Store wrapper whose `apply` fails, writing nothing, while a touched wallet is marked
/// as failing.
pub struct Faulty<S> {
    inner: S,
    faults: Faults,
}

impl<S: State> Faulty<S> {
    pub fn new(inner: S, faults: Faults) -> Self {
        Self { inner, faults }
    }
}

impl<S: State> State for Faulty<S> {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        self.inner.get(key).await
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.inner.insert(key, value).await
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn apply(&mut self, changes: Vec<(Key, Status)>) -> Result<()> {
        if let Some(user_id) = self.faults.tripped(&changes) {
            bail!("injected write failure for wallet {user_id}");
        }
        self.inner.apply(changes).await
    }
}

/// Engine over an in-memory store with default configuration.
pub fn memory_engine() -> Engine<Memory> {
    Engine::new(Memory::default(), EngineConfig::default())
        .unwrap_or_else(|err| panic!("default config rejected: {err}"))
}

/// Engine whose store can be told to fail writes for specific wallets.
pub fn faulty_engine() -> (Engine<Faulty<Memory>>, Faults) {
    let faults = Faults::default();
    let store = Faulty::new(Memory::default(), faults.clone());
    let engine = Engine::new(store, EngineConfig::default())
        .unwrap_or_else(|err| panic!("default config rejected: {err}"));
    (engine, faults)
}

/// Registers a user and deposits `amount` when non-zero.
pub async fn funded_user<S: State>(engine: &Engine<S>, phone: &str, amount: u64) -> UserId {
    let user = engine
        .register_user(phone, None)
        .await
        .unwrap_or_else(|err| panic!("register {phone}: {err}"));
    if amount > 0 {
        engine
            .mint_deposit(user.id, amount, Some("fixture"))
            .await
            .unwrap_or_else(|err| panic!("deposit for {phone}: {err}"));
    }
    user.id
}

pub fn payout() -> PayoutDetails {
    PayoutDetails {
        method: "bank_transfer".to_string(),
        account: "0011-0123-4567".to_string(),
        holder: "Test Holder".to_string(),
    }
}
