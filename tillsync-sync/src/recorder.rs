//! Transaction recorder: the write path for user actions.
//!
//! Online, an action goes straight to the remote and only touches local state
//! once the remote accepted it. A remote failure is returned as-is and nothing
//! is queued; the user retries by hand.
//!
//! Offline, the action is applied to [`AppState`] first and then appended to
//! the durable queue. Between those two steps the visible state is ahead of
//! the queue. If the append fails the state change is rolled back and the
//! storage error is returned, so an action never looks recorded when it was not.

use crate::backend::{RemoteBackend, replay};
use crate::cache::CacheMirror;
use crate::connectivity::ConnectivityMonitor;
use crate::error::SyncResult;
use crate::state::AppState;
use std::sync::Arc;
use tillsync_storage::OfflineQueue;
use tillsync_types::{
    Customer, CustomerChange, CustomerId, DeadLetter, EntryId, Operation, Product, ProductChange,
    ProductId, QueueEntry, Sale,
};
use tracing::{debug, info, warn};

/// What happened to a recorded action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The remote accepted the action.
    Applied,
    /// The action was queued for replay and applied locally.
    Queued(QueueEntry),
}

impl RecordOutcome {
    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Decides, per action, whether to go live or queue.
#[derive(Clone)]
pub struct TransactionRecorder {
    queue: Arc<OfflineQueue>,
    monitor: ConnectivityMonitor,
    mirror: CacheMirror,
    state: AppState,
    backend: Arc<dyn RemoteBackend>,
}

impl TransactionRecorder {
    pub fn new(
        queue: Arc<OfflineQueue>,
        monitor: ConnectivityMonitor,
        mirror: CacheMirror,
        state: AppState,
        backend: Arc<dyn RemoteBackend>,
    ) -> Self {
        Self {
            queue,
            monitor,
            mirror,
            state,
            backend,
        }
    }

    /// Records a user action.
    pub async fn record(&self, operation: Operation) -> SyncResult<RecordOutcome> {
        if self.monitor.is_offline() {
            self.record_offline(operation).await
        } else {
            self.record_online(operation).await
        }
    }

    async fn record_online(&self, operation: Operation) -> SyncResult<RecordOutcome> {
        replay(self.backend.as_ref(), &operation).await?;
        let _ = self.state.apply(&operation).await;
        if let Err(e) = self.mirror.record_confirmed(&operation).await {
            warn!("Failed to update cache after {}: {}", operation.kind(), e);
        }
        debug!("Recorded {} online", operation.kind());
        Ok(RecordOutcome::Applied)
    }

    async fn record_offline(&self, operation: Operation) -> SyncResult<RecordOutcome> {
        let applied = self.state.apply(&operation).await;
        match self.queue.append(operation).await {
            Ok(entry) => {
                self.state.mark_pending(entry.id).await;
                info!("Queued {} for sync: {}", entry.kind(), entry.operation.summary());
                Ok(RecordOutcome::Queued(entry))
            }
            Err(e) => {
                warn!("Failed to queue offline action, rolling back: {}", e);
                self.state.rollback(applied).await;
                Err(e.into())
            }
        }
    }

    // ── Convenience wrappers ─────────────────────────────────────

    pub async fn record_sale(&self, sale: Sale) -> SyncResult<RecordOutcome> {
        self.record(sale.into()).await
    }

    pub async fn upsert_customer(&self, customer: Customer) -> SyncResult<RecordOutcome> {
        self.record(CustomerChange::Upsert(customer).into()).await
    }

    pub async fn delete_customer(&self, id: CustomerId) -> SyncResult<RecordOutcome> {
        self.record(CustomerChange::Delete(id).into()).await
    }

    pub async fn upsert_product(&self, product: Product) -> SyncResult<RecordOutcome> {
        self.record(ProductChange::Upsert(product).into()).await
    }

    pub async fn delete_product(&self, id: ProductId) -> SyncResult<RecordOutcome> {
        self.record(ProductChange::Delete(id).into()).await
    }

    // ── Pending transaction management ───────────────────────────

    /// Entries awaiting sync, oldest first.
    pub async fn pending(&self) -> SyncResult<Vec<QueueEntry>> {
        Ok(self.queue.list_pending().await?)
    }

    /// Entries that need the user's attention.
    pub async fn dead_letters(&self) -> SyncResult<Vec<DeadLetter>> {
        Ok(self.queue.list_dead_letters().await?)
    }

    /// Removes a pending entry or dead letter at the user's request and
    /// reverts its effect on the visible state.
    ///
    /// Returns `false` if the id is unknown.
    pub async fn discard(&self, id: EntryId) -> SyncResult<bool> {
        let operation = match self.queue.get(id).await? {
            Some(entry) => Some(entry.operation),
            None => self
                .queue
                .list_dead_letters()
                .await?
                .into_iter()
                .find(|d| d.id() == id)
                .map(|d| d.entry.operation),
        };
        if !self.queue.discard(id).await? {
            return Ok(false);
        }
        if let Some(Operation::Sale(sale)) = operation {
            self.state.forget_sale(sale.id).await;
        }
        self.state.hydrate(&self.mirror, &self.queue).await?;
        Ok(true)
    }

    /// Puts a dead letter back at the tail of the queue.
    pub async fn requeue(&self, id: EntryId) -> SyncResult<Option<QueueEntry>> {
        let requeued = self.queue.requeue_dead_letter(id).await?;
        if requeued.is_some() {
            self.state.hydrate(&self.mirror, &self.queue).await?;
        }
        Ok(requeued)
    }
}
