use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::{
    Mutex as AsyncMutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock,
};

/// Slot count below which idle slots are never pruned.
const MIN_PRUNE_THRESHOLD: usize = 1_024;

/// Lock slots created on first use.
///
/// A slot whose only reference is the map has no holder and no waiter. Such slots are
/// dropped once the map doubles past its size after the last prune.
struct Slots<K, L> {
    inner: Mutex<SlotMap<K, L>>,
}

struct SlotMap<K, L> {
    slots: HashMap<K, Arc<L>>,
    prune_at: usize,
}

impl<K: Eq + Hash + Copy, L: Default> Slots<K, L> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SlotMap {
                slots: HashMap::new(),
                prune_at: MIN_PRUNE_THRESHOLD,
            }),
        }
    }

    fn get(&self, key: K) -> Arc<L> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.slots.len() >= map.prune_at {
            map.slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            map.prune_at = (map.slots.len() * 2).max(MIN_PRUNE_THRESHOLD);
        }
        map.slots.entry(key).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }
}

/// One async mutex per key.
pub(crate) struct KeyedMutex<K> {
    slots: Slots<K, AsyncMutex<()>>,
}

impl<K: Eq + Hash + Copy> KeyedMutex<K> {
    pub fn new() -> Self {
        Self {
            slots: Slots::new(),
        }
    }

    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        self.slots.get(key).lock_owned().await
    }
}

/// One async read/write lock per key.
pub(crate) struct KeyedRwLock<K> {
    slots: Slots<K, RwLock<()>>,
}

impl<K: Eq + Hash + Copy> KeyedRwLock<K> {
    pub fn new() -> Self {
        Self {
            slots: Slots::new(),
        }
    }

    pub async fn read(&self, key: K) -> OwnedRwLockReadGuard<()> {
        self.slots.get(key).read_owned().await
    }

    pub async fn write(&self, key: K) -> OwnedRwLockWriteGuard<()> {
        self.slots.get(key).write_owned().await
    }
}
