//! tillsync agent
//!
//! Inspects and drains the offline transaction queue of a till.
//!
//! Usage:
//!   tillsync --db till.db --server https://pos.example.com status
//!   tillsync sync-now
//!   tillsync run
//!
//! `run` polls the server's health endpoint and replays the queue whenever
//! connectivity comes back, until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tillsync_agent::{AgentConfig, Command, execute};
use tillsync_storage::SqliteStore;
use tillsync_sync::{
    HttpBackend, OfflineClient, ProbeConfig, ReachabilityProbe, TracingNotifier,
};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "tillsync")]
#[command(about = "Offline transaction queue agent for tillsync")]
struct Args {
    /// Path to the local queue database
    #[arg(long, default_value = "tillsync.db")]
    db: PathBuf,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server base URL (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(server) = &args.server {
        config.server.base_url = server.clone();
    }
    // Connectivity is unknown until the first health check.
    config.client.start_offline = true;

    let store = Arc::new(
        SqliteStore::open(&args.db)
            .with_context(|| format!("Failed to open queue database {}", args.db.display()))?,
    );
    let backend = Arc::new(HttpBackend::new(config.server.clone())?);

    if args.command == Command::Run {
        return run_daemon(store, backend, config).await;
    }

    let client = OfflineClient::open(
        store,
        backend.clone(),
        Arc::new(TracingNotifier),
        config.client.clone(),
    )
    .await?;
    let probe = ReachabilityProbe::new(
        backend,
        client.monitor().clone(),
        ProbeConfig {
            failure_threshold: 1,
            ..config.client.probe.clone().unwrap_or_default()
        },
    );

    let output = execute(&client, &probe, &args.command).await?;
    println!("{output}");
    Ok(())
}

async fn run_daemon(
    store: Arc<SqliteStore>,
    backend: Arc<HttpBackend>,
    mut config: AgentConfig,
) -> Result<()> {
    let probe = config.client.probe.get_or_insert_with(ProbeConfig::default);
    info!(
        "Watching {} every {} ms",
        config.server.base_url, probe.interval_ms
    );

    let client = OfflineClient::open(
        store,
        backend,
        Arc::new(TracingNotifier),
        config.client.clone(),
    )
    .await?;
    let tasks = client.spawn_background();

    let status = client.status().await?;
    info!("{} pending transaction(s) at startup", status.pending_count);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");
    tasks.abort();
    Ok(())
}
