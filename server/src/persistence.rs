use anyhow::{anyhow, Context, Result};
use commonware_codec::{DecodeExt, Encode};
use marcador_execution::{Memory, State, Status};
use marcador_types::{Key, Value};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Requests queued for the connection worker before callers wait.
const REQUEST_BUFFER: usize = 64;

enum Request {
    Get {
        key: Key,
        reply: oneshot::Sender<Result<Option<Value>>>,
    },
    Apply {
        changes: Vec<(Key, Status)>,
        reply: oneshot::Sender<Result<()>>,
    },
    Len {
        reply: oneshot::Sender<Result<usize>>,
    },
}

/// Durable store keeping every encoded `Key`/`Value` pair in a single SQLite table.
///
/// The connection lives on a dedicated thread; async callers exchange requests with it
/// over channels.
pub struct SqliteStore {
    sender: mpsc::Sender<Request>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("open state db at {}", path.display()))?;
        init_schema_sqlite(&conn)?;
        let entries = count_entries(&conn)?;

        let (sender, receiver) = mpsc::channel(REQUEST_BUFFER);
        std::thread::Builder::new()
            .name("state-db".to_string())
            .spawn(move || state_worker(conn, receiver))
            .context("spawn state db worker")?;
        info!(path = %path.display(), entries, "state db opened");
        Ok(Self { sender })
    }

    /// Number of stored entries.
    pub async fn len(&self) -> Result<usize> {
        self.request(|reply| Request::Len { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| anyhow!("state db worker stopped"))?;
        response
            .await
            .map_err(|_| anyhow!("state db worker dropped request"))?
    }
}

fn init_schema_sqlite(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         CREATE TABLE IF NOT EXISTS state (
             key BLOB PRIMARY KEY,
             value BLOB NOT NULL
         );",
    )
    .context("init state schema")?;
    Ok(())
}

fn count_entries(conn: &Connection) -> Result<usize> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM state", [], |row| row.get(0))
        .context("count state entries")?;
    Ok(count as usize)
}

fn read_value(conn: &Connection, key: &Key) -> Result<Option<Value>> {
    let bytes = conn
        .query_row(
            "SELECT value FROM state WHERE key = ?1",
            params![key.encode().to_vec()],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .with_context(|| format!("read {key:?}"))?;
    bytes
        .map(|bytes| Value::decode(&mut bytes.as_slice()).context("decode state value"))
        .transpose()
}

fn write_batch(conn: &mut Connection, changes: &[(Key, Status)]) -> Result<()> {
    let tx = conn.transaction().context("begin state batch")?;
    for (key, status) in changes {
        let key_bytes = key.encode().to_vec();
        match status {
            Status::Update(value) => tx.execute(
                "INSERT OR REPLACE INTO state (key, value) VALUES (?1, ?2)",
                params![key_bytes, value.encode().to_vec()],
            ),
            Status::Delete => tx.execute("DELETE FROM state WHERE key = ?1", params![key_bytes]),
        }
        .with_context(|| format!("write {key:?}"))?;
    }
    // Dropping an uncommitted transaction rolls the whole batch back.
    tx.commit().context("commit state batch")?;
    Ok(())
}

fn state_worker(mut conn: Connection, mut receiver: mpsc::Receiver<Request>) {
    while let Some(request) = receiver.blocking_recv() {
        let delivered = match request {
            Request::Get { key, reply } => reply.send(read_value(&conn, &key)).is_ok(),
            Request::Apply { changes, reply } => {
                let result = write_batch(&mut conn, &changes);
                if let Err(err) = &result {
                    error!(?err, changes = changes.len(), "state batch failed");
                }
                reply.send(result).is_ok()
            }
            Request::Len { reply } => reply.send(count_entries(&conn)).is_ok(),
        };
        if !delivered {
            debug!("state db caller went away before its reply");
        }
    }
    debug!("state db worker exiting");
}

impl State for SqliteStore {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        let key = key.clone();
        self.request(|reply| Request::Get { key, reply }).await
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.apply(vec![(key, Status::Update(value))]).await
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.apply(vec![(key.clone(), Status::Delete)]).await
    }

    async fn apply(&mut self, changes: Vec<(Key, Status)>) -> Result<()> {
        self.request(|reply| Request::Apply { changes, reply }).await
    }
}

/// Backend selected at startup: ephemeral memory or a SQLite file.
pub enum Store {
    Memory(Memory),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn open(database: Option<&Path>) -> Result<Self> {
        match database {
            Some(path) => Ok(Self::Sqlite(SqliteStore::open(path)?)),
            None => Ok(Self::Memory(Memory::default())),
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Sqlite(_))
    }
}

impl State for Store {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        match self {
            Self::Memory(store) => store.get(key).await,
            Self::Sqlite(store) => store.get(key).await,
        }
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        match self {
            Self::Memory(store) => store.insert(key, value).await,
            Self::Sqlite(store) => store.insert(key, value).await,
        }
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        match self {
            Self::Memory(store) => store.delete(key).await,
            Self::Sqlite(store) => store.delete(key).await,
        }
    }

    async fn apply(&mut self, changes: Vec<(Key, Status)>) -> Result<()> {
        match self {
            Self::Memory(store) => store.apply(changes).await,
            Self::Sqlite(store) => store.apply(changes).await,
        }
    }
}
