//! Connectivity monitor.
//!
//! The single source of truth for online/offline state. The runtime's network
//! signal (or a [`ReachabilityProbe`](crate::ReachabilityProbe)) feeds
//! [`ConnectivityMonitor::set_status`]; every other component reads the
//! current status synchronously or subscribes to transitions.

use crate::error::SyncResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tillsync_storage::OfflineQueue;
use tokio::sync::watch;
use tracing::info;

/// Network reachability as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Online,
    Offline,
}

impl NetworkStatus {
    #[must_use]
    pub fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Derived view of connectivity for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_offline: bool,
    /// Number of unsynced queue entries.
    pub pending_count: usize,
}

impl ConnectivityState {
    /// Text for the status banner, if one should be shown.
    #[must_use]
    pub fn banner(&self) -> Option<String> {
        match (self.is_offline, self.pending_count) {
            (true, 0) => Some("Offline: transactions will be queued".to_string()),
            (true, n) => Some(format!("Offline: {n} pending transaction(s)")),
            (false, 0) => None,
            (false, n) => Some(format!("{n} pending transaction(s)")),
        }
    }

    /// Whether a manual "Sync Now" action makes sense.
    #[must_use]
    pub fn show_sync_now(&self) -> bool {
        !self.is_offline && self.pending_count > 0
    }
}

/// Multiplexes the online/offline flag to every consumer.
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<NetworkStatus>>,
    queue: Arc<OfflineQueue>,
}

impl ConnectivityMonitor {
    /// Creates a monitor starting in `initial` status.
    pub fn new(initial: NetworkStatus, queue: Arc<OfflineQueue>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            tx: Arc::new(tx),
            queue,
        }
    }

    /// Current status, without waiting.
    #[must_use]
    pub fn status(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.status() == NetworkStatus::Offline
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status() == NetworkStatus::Online
    }

    /// Feeds a reachability reading. Returns true if it changed the status.
    ///
    /// Repeated readings of the same status are absorbed here, so subscribers
    /// only wake on real transitions.
    pub fn set_status(&self, status: NetworkStatus) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            info!("Connectivity changed: now {}", status);
        }
        changed
    }

    pub fn set_online(&self, online: bool) -> bool {
        self.set_status(NetworkStatus::from_online(online))
    }

    /// Subscribes to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }

    /// Current status plus the pending count from the queue.
    pub async fn state(&self) -> SyncResult<ConnectivityState> {
        let pending_count = self.queue.pending_count().await?;
        Ok(ConnectivityState {
            is_offline: self.is_offline(),
            pending_count,
        })
    }

    /// The queue whose pending count is reported.
    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }
}
