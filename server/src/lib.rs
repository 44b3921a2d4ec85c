//! HTTP backend for the marcador ledger.
//!
//! Wraps an [`Engine`] over a [`Store`] (SQLite file or memory) and serves it through a
//! JSON API plus a WebSocket stream of committed changes.

use anyhow::{Context, Result};
use marcador_execution::{Engine, EngineConfig};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

mod api;
mod persistence;

pub use api::{Api, ApiError};
pub use persistence::{SqliteStore, Store};

/// Engine type served by this crate.
pub type Ledger = Engine<Store>;

const DEFAULT_WS_OUTBOUND_BUFFER: usize = 256;
const DEFAULT_WS_SEND_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_BODY_LIMIT_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub engine: EngineConfig,
    /// SQLite file holding the ledger. Memory only when unset.
    pub database: Option<PathBuf>,
    /// Max request body size. `None` disables the limit.
    pub body_limit_bytes: Option<usize>,
    pub ws_outbound_buffer: usize,
    pub ws_send_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            database: None,
            body_limit_bytes: Some(DEFAULT_BODY_LIMIT_BYTES),
            ws_outbound_buffer: DEFAULT_WS_OUTBOUND_BUFFER,
            ws_send_timeout: DEFAULT_WS_SEND_TIMEOUT,
        }
    }
}

/// Reads an engine configuration from a YAML file. Missing fields take their defaults.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let config: EngineConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
}

/// State shared by every request handler.
pub struct Service {
    ledger: Ledger,
    config: ServerConfig,
    durable: bool,
}

impl Service {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = Store::open(config.database.as_deref())?;
        let durable = store.is_durable();
        let ledger = Engine::new(store, config.engine.clone()).context("start engine")?;
        Ok(Self {
            ledger,
            config,
            durable,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "withdrawal_fee_bps: 150\nsettlement_concurrency: 2").unwrap();

        let config = load_engine_config(file.path()).unwrap();
        assert_eq!(config.withdrawal_fee_bps, 150);
        assert_eq!(config.settlement_concurrency, 2);
        assert_eq!(config.max_commit_retries, EngineConfig::default().max_commit_retries);
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "withdrawal_fee_bps: 10000").unwrap();
        let err = load_engine_config(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config"), "{err:#}");

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "payout_bonus: 3").unwrap();
        assert!(load_engine_config(file.path()).is_err());
    }

    #[test]
    fn test_service_defaults_to_memory() {
        let service = Service::new(ServerConfig::default()).unwrap();
        assert!(!service.durable);
        assert_eq!(service.config().ws_outbound_buffer, DEFAULT_WS_OUTBOUND_BUFFER);
    }
}
