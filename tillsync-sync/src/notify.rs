//! One-way notification sink for user-visible sync events.
//!
//! The core never waits on or reads back from a notifier; delivery is
//! fire-and-forget.

use tillsync_types::EntryId;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Connectivity was lost; actions will be queued.
    OfflineMode,
    /// Connectivity is back; a drain is about to start.
    BackOnline,
    /// A drain finished. Only sent when the drain had entries to replay.
    SyncCompleted {
        succeeded: usize,
        failed: usize,
        dead_lettered: usize,
    },
    /// A drain aborted on a storage fault.
    SyncFailed { message: String },
    /// An entry will no longer be retried automatically.
    DeadLettered { id: EntryId, reason: String },
}

/// Receives notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Fans notifications out to any number of subscribers.
///
/// Notifications sent while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    /// Creates a notifier buffering up to `capacity` notifications per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::OfflineMode => warn!("Offline: new transactions will be queued"),
            Notification::BackOnline => info!("Back online"),
            Notification::SyncCompleted {
                succeeded,
                failed,
                dead_lettered,
            } => info!(
                "Sync finished: {} synced, {} failed ({} need attention)",
                succeeded, failed, dead_lettered
            ),
            Notification::SyncFailed { message } => warn!("Sync aborted: {}", message),
            Notification::DeadLettered { id, reason } => {
                warn!("Transaction {} needs attention: {}", id, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let notifier = BroadcastNotifier::new(8);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        notifier.notify(Notification::BackOnline);

        assert_eq!(a.recv().await.unwrap(), Notification::BackOnline);
        assert_eq!(b.recv().await.unwrap(), Notification::BackOnline);
    }

    #[test]
    fn broadcast_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::default();
        notifier.notify(Notification::OfflineMode);
    }
}
