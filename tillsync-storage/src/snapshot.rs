//! Raw snapshot persistence for mirrored datasets.

use crate::error::StorageResult;
use crate::keys;
use crate::kv::{KeyValueStore, get_json, to_json};
use crate::run_blocking;
use std::sync::Arc;
use tillsync_types::{CacheSnapshot, CachedRecord, DatasetKind};
use tracing::debug;

/// Stores one snapshot per [`DatasetKind`], last write wins.
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Overwrites the snapshot for `T`'s dataset.
    pub async fn save<T: CachedRecord>(&self, snapshot: &CacheSnapshot<T>) -> StorageResult<()> {
        let key = keys::snapshot(T::KIND);
        let json = to_json(snapshot)?;
        let count = snapshot.len();
        run_blocking(&self.store, move |store| store.put(&key, &json)).await?;
        debug!("Saved {} snapshot ({} items)", T::KIND, count);
        Ok(())
    }

    /// Returns the last saved snapshot, or an empty one on cold start.
    pub async fn load<T: CachedRecord>(&self) -> StorageResult<CacheSnapshot<T>> {
        let key = keys::snapshot(T::KIND);
        let snapshot = run_blocking(&self.store, move |store| get_json(store, &key)).await?;
        Ok(snapshot.unwrap_or_default())
    }

    /// Returns true if a snapshot has ever been saved for `kind`.
    pub async fn exists(&self, kind: DatasetKind) -> StorageResult<bool> {
        let key = keys::snapshot(kind);
        run_blocking(&self.store, move |store| Ok(store.get(&key)?.is_some())).await
    }
}
