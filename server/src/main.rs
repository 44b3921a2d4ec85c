use anyhow::{Context, Result};
use clap::Parser;
use marcador_execution::EngineConfig;
use marcador_server::{load_engine_config, Api, ServerConfig, Service};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Path to the SQLite ledger database (in-memory ledger when omitted).
    #[arg(long)]
    database: Option<PathBuf>,

    /// YAML file with tier schedules, fees and engine tunables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Capacity of the change broadcast shared by all updates subscribers; a subscriber
    /// further behind skips ahead (0 uses the configured value).
    #[arg(long)]
    updates_buffer: Option<usize>,

    /// Max request body size in bytes (0 disables limit).
    #[arg(long)]
    body_limit_bytes: Option<usize>,
}

fn init_tracing(level: tracing::Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn build_config(args: &Args) -> Result<ServerConfig> {
    let defaults = ServerConfig::default();
    let mut engine = match &args.config {
        Some(path) => load_engine_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(buffer) = args.updates_buffer.filter(|buffer| *buffer > 0) {
        engine.notification_buffer = buffer;
    }
    let body_limit_bytes = match args.body_limit_bytes {
        Some(0) => None,
        Some(limit) => Some(limit),
        None => defaults.body_limit_bytes,
    };
    Ok(ServerConfig {
        engine,
        database: args.database.clone(),
        body_limit_bytes,
        ..defaults
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level);

    let config = build_config(&args)?;
    info!(
        database = ?config.database,
        settlement_concurrency = config.engine.settlement_concurrency,
        withdrawal_fee_bps = config.engine.withdrawal_fee_bps,
        "starting marcador server"
    );
    let service = Arc::new(Service::new(config)?);
    let app = Api::new(service).router();

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    Ok(())
}
