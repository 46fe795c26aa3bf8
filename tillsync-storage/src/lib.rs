//! Local persistence for tillsync.
//!
//! Everything the offline subsystem keeps on the device lives in a
//! [`KeyValueStore`]: one serialized list of pending queue entries, one list
//! of dead letters, and one snapshot per mirrored dataset.
//!
//! # Architecture
//!
//! - [`KeyValueStore`] is the storage medium seam. [`SqliteStore`] persists to
//!   a file (or memory); [`MemoryStore`] is process-local.
//! - [`OfflineQueue`] is the durable FIFO of [`QueueEntry`] records.
//! - [`SnapshotStore`] reads and writes [`CacheSnapshot`]s without any policy;
//!   the online-only write rule is enforced one layer up.
//!
//! Values are JSON. Blocking backend calls run on tokio's blocking pool so
//! callers on the async runtime never stall.
//!
//! [`QueueEntry`]: tillsync_types::QueueEntry
//! [`CacheSnapshot`]: tillsync_types::CacheSnapshot

mod error;
mod kv;
mod queue;
mod snapshot;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use kv::{KeyValueStore, MemoryStore};
pub use queue::OfflineQueue;
pub use snapshot::SnapshotStore;
pub use sqlite::SqliteStore;

/// Logical keys used inside the key-value store.
pub mod keys {
    use tillsync_types::DatasetKind;

    /// Serialized list of entries awaiting replay.
    pub const PENDING_QUEUE: &str = "queue/pending";

    /// Serialized list of parked entries.
    pub const DEAD_LETTERS: &str = "queue/dead_letter";

    /// Key of the snapshot for a mirrored dataset.
    #[must_use]
    pub fn snapshot(kind: DatasetKind) -> String {
        format!("cache/{kind}")
    }
}

use std::sync::Arc;

/// Runs a closure against the store on the blocking pool.
pub(crate) async fn run_blocking<T, F>(store: &Arc<dyn KeyValueStore>, f: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn KeyValueStore) -> StorageResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}
