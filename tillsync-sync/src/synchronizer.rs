//! Queue synchronizer.
//!
//! A drain replays every pending entry, oldest first, against the remote:
//!
//! 1. Refuse if offline, or if another drain holds the guard.
//! 2. Snapshot the pending list. Entries appended after this point wait for
//!    the next trigger.
//! 3. For each entry still in the queue, replay it.
//!    - Success: mark synced, then remove.
//!    - Transient failure: count the attempt and leave the entry queued.
//!    - Rejection, or too many attempts: move the entry to the dead letters.
//!    - Remote unreachable: stop the pass. Neither this entry nor the rest
//!      is charged an attempt; all stay queued for the next trigger.
//!
//!    Otherwise one failure never stops later entries from being tried.
//! 4. Clear synced leftovers, refresh the cache mirror, rebuild app state.
//! 5. Report a summary through the notifier.
//!
//! There is no in-pass retry loop. A failed entry waits for the next
//! reconnect or a manual "Sync Now". A storage fault aborts the pass; an
//! entry whose remote call succeeded but whose removal failed is replayed
//! again next time.

use crate::backend::{RemoteBackend, RemoteError, replay};
use crate::cache::CacheMirror;
use crate::connectivity::{ConnectivityMonitor, NetworkStatus};
use crate::error::SyncResult;
use crate::notify::{Notification, Notifier};
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tillsync_storage::OfflineQueue;
use tillsync_types::{EntryId, EntryKind, QueueEntry};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Synchronizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Failed attempts after which an entry is dead-lettered. Only failures
    /// the remote answered count; values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Whether to re-fetch reference data after a drain replayed anything.
    pub refresh_after_drain: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            refresh_after_drain: true,
        }
    }
}

/// Whether a drain is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Draining,
}

/// One entry that failed during a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayFailure {
    pub id: EntryId,
    pub kind: EntryKind,
    pub error: RemoteError,
    /// Failed attempts counted against the entry so far.
    pub attempts: u32,
    pub dead_lettered: bool,
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub failures: Vec<ReplayFailure>,
    /// The remote became unreachable and the pass stopped early.
    pub interrupted: bool,
}

impl DrainReport {
    /// True when every attempted entry was accepted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Result of asking for a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain was running; this trigger was ignored.
    AlreadyRunning,
    /// Offline; nothing was attempted.
    Offline,
}

/// Releases the drain guard when the pass ends, however it ends.
struct DrainGuard<'a> {
    running: &'a AtomicBool,
    phase: &'a watch::Sender<SyncPhase>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.phase.send_replace(SyncPhase::Idle);
    }
}

/// Drains the queue against the remote.
pub struct Synchronizer {
    queue: Arc<OfflineQueue>,
    monitor: ConnectivityMonitor,
    mirror: CacheMirror,
    state: AppState,
    backend: Arc<dyn RemoteBackend>,
    notifier: Arc<dyn Notifier>,
    config: SyncConfig,
    running: AtomicBool,
    phase: watch::Sender<SyncPhase>,
}

impl Synchronizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<OfflineQueue>,
        monitor: ConnectivityMonitor,
        mirror: CacheMirror,
        state: AppState,
        backend: Arc<dyn RemoteBackend>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            queue,
            monitor,
            mirror,
            state,
            backend,
            notifier,
            config,
            running: AtomicBool::new(false),
            phase,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Subscribes to phase changes.
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    fn try_begin(&self) -> Option<DrainGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.phase.send_replace(SyncPhase::Draining);
        Some(DrainGuard {
            running: &self.running,
            phase: &self.phase,
        })
    }

    /// Runs one drain pass if online and no other pass is running.
    pub async fn drain(&self) -> SyncResult<DrainOutcome> {
        if self.monitor.is_offline() {
            debug!("Drain requested while offline, skipping");
            return Ok(DrainOutcome::Offline);
        }
        let Some(_guard) = self.try_begin() else {
            debug!("Drain already running, ignoring trigger");
            return Ok(DrainOutcome::AlreadyRunning);
        };

        match self.run_pass().await {
            Ok(report) => {
                if report.attempted > 0 {
                    info!(
                        "Drain finished: {} attempted, {} synced, {} failed, {} dead-lettered",
                        report.attempted, report.succeeded, report.failed, report.dead_lettered
                    );
                    self.notifier.notify(Notification::SyncCompleted {
                        succeeded: report.succeeded,
                        failed: report.failed,
                        dead_lettered: report.dead_lettered,
                    });
                }
                Ok(DrainOutcome::Completed(report))
            }
            Err(e) => {
                warn!("Drain aborted: {}", e);
                self.notifier.notify(Notification::SyncFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_pass(&self) -> SyncResult<DrainReport> {
        let snapshot = self.queue.list_pending().await?;
        let mut report = DrainReport::default();
        if snapshot.is_empty() {
            return Ok(report);
        }
        debug!("Draining {} pending entries", snapshot.len());

        let total = snapshot.len();
        for (index, entry) in snapshot.into_iter().enumerate() {
            // Discarded by the user since the snapshot was taken.
            let still_pending = self
                .queue
                .get(entry.id)
                .await?
                .is_some_and(|e| e.is_pending());
            if !still_pending {
                continue;
            }

            report.attempted += 1;
            match replay(self.backend.as_ref(), &entry.operation).await {
                Ok(()) => {
                    self.queue.mark_synced(entry.id).await?;
                    self.queue.remove(entry.id).await?;
                    self.state.clear_pending(entry.id).await;
                    if let Err(e) = self.mirror.record_confirmed(&entry.operation).await {
                        debug!("Cache not updated for {}: {}", entry.id, e);
                    }
                    report.succeeded += 1;
                }
                Err(error) if error.is_unreachable() => {
                    self.queue.note_error(entry.id, error.to_string()).await?;
                    warn!(
                        "Remote unreachable during drain, leaving {} entries pending: {}",
                        total - index,
                        error
                    );
                    report.failed += 1;
                    report.failures.push(ReplayFailure {
                        id: entry.id,
                        kind: entry.kind(),
                        error,
                        attempts: entry.attempts,
                        dead_lettered: false,
                    });
                    report.interrupted = true;
                    break;
                }
                Err(error) => {
                    let failure = self.handle_failure(&entry, error).await?;
                    report.failed += 1;
                    if failure.dead_lettered {
                        report.dead_lettered += 1;
                    }
                    report.failures.push(failure);
                }
            }
        }

        self.queue.clear_all_synced().await?;

        if report.succeeded > 0 && !report.interrupted && self.config.refresh_after_drain {
            if let Err(e) = self.mirror.refresh(self.backend.as_ref()).await {
                warn!("Cache refresh after drain failed: {}", e);
            }
        }
        self.state.hydrate(&self.mirror, &self.queue).await?;

        Ok(report)
    }

    async fn handle_failure(
        &self,
        entry: &QueueEntry,
        error: RemoteError,
    ) -> SyncResult<ReplayFailure> {
        let attempts = self
            .queue
            .record_failure(entry.id, error.to_string())
            .await?
            .unwrap_or(entry.attempts.saturating_add(1));

        let reason = if !error.is_transient() {
            Some(format!("rejected by remote: {}", error.message))
        } else if attempts >= self.config.max_attempts.max(1) {
            Some(format!(
                "gave up after {} attempts: {}",
                attempts, error.message
            ))
        } else {
            None
        };

        let dead_lettered = match reason {
            Some(reason) => {
                let moved = self.queue.move_to_dead_letter(entry.id, reason.clone()).await?;
                if moved {
                    self.state.clear_pending(entry.id).await;
                    self.notifier.notify(Notification::DeadLettered {
                        id: entry.id,
                        reason,
                    });
                }
                moved
            }
            None => {
                warn!(
                    "Replay of {} {} failed (attempt {}): {}",
                    entry.kind(),
                    entry.id,
                    attempts,
                    error
                );
                false
            }
        };

        Ok(ReplayFailure {
            id: entry.id,
            kind: entry.kind(),
            error,
            attempts,
            dead_lettered,
        })
    }
}

/// Watches the monitor and drains whenever connectivity comes back.
///
/// Sends [`Notification::BackOnline`] and [`Notification::OfflineMode`] on
/// transitions. Starts with a drain if already online. Rapid flapping can
/// trigger several drains; the drain guard lets only one run at a time.
pub fn spawn_auto_sync(
    monitor: &ConnectivityMonitor,
    synchronizer: Arc<Synchronizer>,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()> {
    let mut rx = monitor.subscribe();
    let mut last = *rx.borrow_and_update();
    tokio::spawn(async move {
        if last == NetworkStatus::Online {
            trigger_drain(&synchronizer);
        }

        while rx.changed().await.is_ok() {
            let status = *rx.borrow_and_update();
            if status == last {
                continue;
            }
            last = status;
            match status {
                NetworkStatus::Online => {
                    notifier.notify(Notification::BackOnline);
                    trigger_drain(&synchronizer);
                }
                NetworkStatus::Offline => notifier.notify(Notification::OfflineMode),
            }
        }
        debug!("Connectivity monitor closed, auto-sync stopped");
    })
}

fn trigger_drain(synchronizer: &Arc<Synchronizer>) {
    let synchronizer = Arc::clone(synchronizer);
    tokio::spawn(async move {
        match synchronizer.drain().await {
            Ok(DrainOutcome::Completed(report)) => {
                debug!("Auto-sync drain done ({} synced)", report.succeeded)
            }
            Ok(DrainOutcome::AlreadyRunning) => debug!("Auto-sync: drain already running"),
            Ok(DrainOutcome::Offline) => debug!("Auto-sync: went offline before drain"),
            Err(e) => warn!("Auto-sync drain failed: {}", e),
        }
    });
}
