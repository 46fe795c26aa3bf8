//! Reachability probe.
//!
//! Polls the remote's health check on an interval and feeds the result into
//! the [`ConnectivityMonitor`]. Used where the runtime has no native
//! connectivity signal. A single failed check is not enough to go offline;
//! `failure_threshold` consecutive failures are.

use crate::backend::RemoteBackend;
use crate::connectivity::{ConnectivityMonitor, NetworkStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Time between checks (ms).
    pub interval_ms: u64,
    /// Consecutive failed checks before reporting offline.
    pub failure_threshold: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            failure_threshold: 2,
        }
    }
}

/// Periodic health check driving the connectivity monitor.
pub struct ReachabilityProbe {
    backend: Arc<dyn RemoteBackend>,
    monitor: ConnectivityMonitor,
    config: ProbeConfig,
    consecutive_failures: AtomicU32,
}

impl ReachabilityProbe {
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        monitor: ConnectivityMonitor,
        config: ProbeConfig,
    ) -> Self {
        Self {
            backend,
            monitor,
            config,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Runs one health check and returns the resulting status.
    pub async fn check_once(&self) -> NetworkStatus {
        match self.backend.health().await {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.monitor.set_status(NetworkStatus::Online);
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("Health check failed ({} in a row): {}", failures, e);
                if failures >= self.config.failure_threshold.max(1) {
                    self.monitor.set_status(NetworkStatus::Offline);
                }
            }
        }
        self.monitor.status()
    }

    /// Checks immediately, then every `interval_ms`, until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_millis(self.config.interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check_once().await;
            }
        })
    }
}
