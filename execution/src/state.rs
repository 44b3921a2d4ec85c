use anyhow::Result;
use marcador_types::{Key, Value};
use std::{collections::HashMap, future::Future};

/// Keyed storage the engine commits to.
///
/// `apply` must be all-or-nothing: a failed batch leaves no partial writes behind.
pub trait State: Send + Sync {
    fn get(&self, key: &Key) -> impl Future<Output = Result<Option<Value>>> + Send;
    fn insert(&mut self, key: Key, value: Value) -> impl Future<Output = Result<()>> + Send;
    fn delete(&mut self, key: &Key) -> impl Future<Output = Result<()>> + Send;

    fn apply(&mut self, changes: Vec<(Key, Status)>) -> impl Future<Output = Result<()>> + Send {
        async {
            for (key, status) in changes {
                match status {
                    Status::Update(value) => self.insert(key, value).await?,
                    Status::Delete => self.delete(&key).await?,
                }
            }
            Ok(())
        }
    }
}

/// In-memory store. Used by tests and by the server's ephemeral mode.
#[derive(Default)]
pub struct Memory {
    state: HashMap<Key, Value>,
}

impl Memory {
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl State for Memory {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.state.get(key).cloned())
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.state.insert(key, value);
        Ok(())
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.state.remove(key);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Status {
    Update(Value),
    Delete,
}
