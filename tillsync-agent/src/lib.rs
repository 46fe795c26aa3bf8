//! Configuration, commands and output formatting for the tillsync agent.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tillsync_sync::{
    ClientConfig, ConnectivityState, DrainOutcome, HttpBackendConfig, OfflineClient,
    ReachabilityProbe,
};
use tillsync_types::{DeadLetter, EntryId, QueueEntry};

/// Agent configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub server: HttpBackendConfig,
    pub client: ClientConfig,
}

impl AgentConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show connectivity and the number of pending transactions
    Status,
    /// List pending transactions, oldest first
    Pending,
    /// List transactions that will not be retried automatically
    DeadLetters,
    /// Replay the queue now
    SyncNow,
    /// Move a dead letter back into the queue
    Requeue { id: String },
    /// Remove a pending transaction or dead letter
    Discard { id: String },
    /// Probe connectivity and sync automatically until Ctrl-C
    Run,
}

/// Parses an entry id given on the command line.
pub fn parse_entry_id(raw: &str) -> Result<EntryId> {
    EntryId::parse(raw.trim()).with_context(|| format!("Invalid entry id: {raw}"))
}

/// Runs a one-shot command and returns what to print.
///
/// `probe` is consulted once before commands that depend on connectivity.
pub async fn execute(
    client: &OfflineClient,
    probe: &ReachabilityProbe,
    command: &Command,
) -> Result<String> {
    match command {
        Command::Status => {
            probe.check_once().await;
            Ok(render_status(&client.status().await?))
        }
        Command::Pending => Ok(render_pending(&client.recorder().pending().await?)),
        Command::DeadLetters => Ok(render_dead_letters(
            &client.recorder().dead_letters().await?,
        )),
        Command::SyncNow => {
            probe.check_once().await;
            Ok(render_drain(&client.sync_now().await?))
        }
        Command::Requeue { id } => {
            let id = parse_entry_id(id)?;
            match client.recorder().requeue(id).await? {
                Some(entry) => Ok(format!("Requeued {}: {}", entry.id, entry.operation.summary())),
                None => bail!("No dead letter with id {id}"),
            }
        }
        Command::Discard { id } => {
            let id = parse_entry_id(id)?;
            if client.recorder().discard(id).await? {
                Ok(format!("Discarded {id}"))
            } else {
                bail!("No pending transaction or dead letter with id {id}")
            }
        }
        Command::Run => bail!("`run` does not return; start it with the daemon loop"),
    }
}

// ── Rendering ───────────────────────────────────────────────────

pub fn render_status(state: &ConnectivityState) -> String {
    let mut out = format!(
        "Connectivity: {}\nPending:      {}",
        if state.is_offline { "offline" } else { "online" },
        state.pending_count
    );
    if let Some(banner) = state.banner() {
        let _ = write!(out, "\n\n  {banner}");
    }
    if state.show_sync_now() {
        out.push_str("\n  Run `tillsync sync-now` to sync them.");
    }
    out
}

pub fn render_pending(entries: &[QueueEntry]) -> String {
    if entries.is_empty() {
        return "No pending transactions".to_string();
    }
    let mut out = format!("{} pending transaction(s):", entries.len());
    for entry in entries {
        let _ = write!(
            out,
            "\n  {}  {}  {}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.operation.summary()
        );
        if entry.attempts > 0 {
            let _ = write!(
                out,
                "  [{} failed attempt(s): {}]",
                entry.attempts,
                entry.last_error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    out
}

pub fn render_dead_letters(dead: &[DeadLetter]) -> String {
    if dead.is_empty() {
        return "No transactions need attention".to_string();
    }
    let mut out = format!("{} transaction(s) need attention:", dead.len());
    for letter in dead {
        let _ = write!(
            out,
            "\n  {}  {}\n      {}",
            letter.id(),
            letter.entry.operation.summary(),
            letter.reason
        );
    }
    out
}

pub fn render_drain(outcome: &DrainOutcome) -> String {
    match outcome {
        DrainOutcome::Offline => "Offline: nothing was synced".to_string(),
        DrainOutcome::AlreadyRunning => "A sync is already running".to_string(),
        DrainOutcome::Completed(report) if report.attempted == 0 => "Nothing to sync".to_string(),
        DrainOutcome::Completed(report) => {
            let mut out = format!(
                "Synced {} of {} transaction(s)",
                report.succeeded, report.attempted
            );
            if report.failed > 0 {
                let _ = write!(
                    out,
                    ", {} failed ({} need attention)",
                    report.failed, report.dead_lettered
                );
                for failure in &report.failures {
                    let _ = write!(out, "\n  {}  {}  {}", failure.id, failure.kind, failure.error);
                }
            }
            if report.interrupted {
                out.push_str("\n  Server unreachable; remaining transactions stay queued.");
            }
            out
        }
    }
}
