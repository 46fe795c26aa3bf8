//! Cache mirror of reference data.
//!
//! Last write wins, online-only writes: a snapshot is replaced only when a
//! fresh read succeeded while online, and is never cleared while offline.
//! Offline edits go through the queue, not through the mirror.

use crate::backend::RemoteBackend;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use tillsync_storage::SnapshotStore;
use tillsync_types::{
    CacheSnapshot, CachedRecord, Customer, CustomerChange, Operation, Product, ProductChange,
};
use tracing::{debug, info};

/// Products and customers as of the last refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshedData {
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
}

/// Read-through mirror of reference datasets.
#[derive(Clone)]
pub struct CacheMirror {
    snapshots: SnapshotStore,
    monitor: ConnectivityMonitor,
}

impl CacheMirror {
    pub fn new(snapshots: SnapshotStore, monitor: ConnectivityMonitor) -> Self {
        Self { snapshots, monitor }
    }

    /// Overwrites the snapshot for `T`'s dataset.
    ///
    /// Fails with [`SyncError::OfflineWrite`] while offline; the existing
    /// snapshot is left untouched.
    pub async fn save<T: CachedRecord>(&self, items: Vec<T>) -> SyncResult<()> {
        if self.monitor.is_offline() {
            return Err(SyncError::OfflineWrite(T::KIND));
        }
        self.snapshots.save(&CacheSnapshot::capture(items)).await?;
        Ok(())
    }

    /// Returns the last snapshot, or an empty one if none was ever saved.
    pub async fn load<T: CachedRecord>(&self) -> SyncResult<CacheSnapshot<T>> {
        Ok(self.snapshots.load::<T>().await?)
    }

    /// When `T`'s dataset was last refreshed.
    pub async fn last_updated<T: CachedRecord>(&self) -> SyncResult<Option<DateTime<Utc>>> {
        Ok(self.load::<T>().await?.last_updated)
    }

    /// Fetches both datasets from the remote and saves them.
    ///
    /// Nothing is saved unless both fetches succeed. Fails with
    /// [`SyncError::Offline`] while offline.
    pub async fn refresh(&self, backend: &dyn RemoteBackend) -> SyncResult<RefreshedData> {
        if self.monitor.is_offline() {
            debug!("Skipping cache refresh while offline");
            return Err(SyncError::Offline);
        }
        let products = backend.fetch_products().await?;
        let customers = backend.fetch_customers().await?;

        self.save(products.clone()).await?;
        self.save(customers.clone()).await?;
        info!(
            "Cache refreshed from {}: {} products, {} customers",
            backend.backend_name(),
            products.len(),
            customers.len()
        );
        Ok(RefreshedData {
            products,
            customers,
        })
    }

    /// Folds an operation the remote has accepted into the affected snapshot.
    ///
    /// Keeps the mirror in step with confirmed writes between full refreshes.
    /// `last_updated` is left as it was: only a refresh counts as a fresh read.
    pub async fn record_confirmed(&self, operation: &Operation) -> SyncResult<()> {
        match operation {
            Operation::Sale(sale) => {
                self.patch(|products: &mut Vec<Product>| {
                    for item in &sale.items {
                        if let Some(product) =
                            products.iter_mut().find(|p| p.id == item.product_id)
                        {
                            product.stock -= i64::from(item.quantity);
                        }
                    }
                })
                .await
            }
            Operation::CustomerChange(change) => {
                let id = change.customer_id();
                self.patch(|customers: &mut Vec<Customer>| match change {
                    CustomerChange::Upsert(customer) => {
                        match customers.iter_mut().find(|c| c.id == id) {
                            Some(existing) => *existing = customer.clone(),
                            None => customers.push(customer.clone()),
                        }
                    }
                    CustomerChange::Delete(_) => customers.retain(|c| c.id != id),
                })
                .await
            }
            Operation::ProductChange(change) => {
                let id = change.product_id();
                self.patch(|products: &mut Vec<Product>| match change {
                    ProductChange::Upsert(product) => {
                        match products.iter_mut().find(|p| p.id == id) {
                            Some(existing) => *existing = product.clone(),
                            None => products.push(product.clone()),
                        }
                    }
                    ProductChange::Delete(_) => products.retain(|p| p.id != id),
                })
                .await
            }
        }
    }

    /// Edits the items of `T`'s snapshot in place, keeping its timestamp.
    async fn patch<T, F>(&self, edit: F) -> SyncResult<()>
    where
        T: CachedRecord,
        F: FnOnce(&mut Vec<T>),
    {
        if self.monitor.is_offline() {
            return Err(SyncError::OfflineWrite(T::KIND));
        }
        let mut snapshot = self.load::<T>().await?;
        edit(&mut snapshot.items);
        self.snapshots.save(&snapshot).await?;
        Ok(())
    }
}
