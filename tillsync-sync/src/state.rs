//! In-memory application state.
//!
//! [`AppState`] is what screens read: the product catalog, customer list,
//! sales recorded this session and which queue entries are still pending.
//! It is an explicit handle passed to whoever needs it; clones share the same
//! state. Every change bumps a version number that subscribers can watch.
//!
//! Offline actions are applied here before they are durably queued. The
//! [`Applied`] token returned by [`AppState::apply`] undoes exactly that
//! change if the queue write then fails.

use crate::cache::CacheMirror;
use crate::error::SyncResult;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tillsync_types::{
    Customer, CustomerChange, CustomerId, EntryId, Operation, Product, ProductChange, ProductId,
    QueueEntry, Sale, SaleId,
};
use tillsync_storage::OfflineQueue;
use tokio::sync::{RwLock, watch};

#[derive(Debug, Default)]
struct Catalog {
    products: HashMap<ProductId, Product>,
    customers: HashMap<CustomerId, Customer>,
    sales: Vec<Sale>,
    pending: BTreeSet<EntryId>,
}

impl Catalog {
    fn apply(&mut self, operation: &Operation) -> Undo {
        match operation {
            Operation::Sale(sale) => {
                let mut restocks = Vec::new();
                for item in &sale.items {
                    if let Some(product) = self.products.get_mut(&item.product_id) {
                        let qty = i64::from(item.quantity);
                        product.stock -= qty;
                        restocks.push((item.product_id, qty));
                    }
                }
                let recorded = if self.sales.iter().any(|s| s.id == sale.id) {
                    false
                } else {
                    self.sales.push(sale.clone());
                    true
                };
                Undo::Sale {
                    sale_id: sale.id,
                    recorded,
                    restocks,
                }
            }
            Operation::CustomerChange(change) => {
                let id = change.customer_id();
                let previous = match change {
                    CustomerChange::Upsert(customer) => self.customers.insert(id, customer.clone()),
                    CustomerChange::Delete(_) => self.customers.remove(&id),
                };
                Undo::Customer { id, previous }
            }
            Operation::ProductChange(change) => {
                let id = change.product_id();
                let previous = match change {
                    ProductChange::Upsert(product) => self.products.insert(id, product.clone()),
                    ProductChange::Delete(_) => self.products.remove(&id),
                };
                Undo::Product { id, previous }
            }
        }
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::Sale {
                sale_id,
                recorded,
                restocks,
            } => {
                for (product_id, qty) in restocks {
                    if let Some(product) = self.products.get_mut(&product_id) {
                        product.stock += qty;
                    }
                }
                if recorded {
                    self.sales.retain(|s| s.id != sale_id);
                }
            }
            Undo::Customer { id, previous } => match previous {
                Some(customer) => {
                    self.customers.insert(id, customer);
                }
                None => {
                    self.customers.remove(&id);
                }
            },
            Undo::Product { id, previous } => match previous {
                Some(product) => {
                    self.products.insert(id, product);
                }
                None => {
                    self.products.remove(&id);
                }
            },
        }
    }
}

#[derive(Debug)]
enum Undo {
    Sale {
        sale_id: SaleId,
        recorded: bool,
        restocks: Vec<(ProductId, i64)>,
    },
    Customer {
        id: CustomerId,
        previous: Option<Customer>,
    },
    Product {
        id: ProductId,
        previous: Option<Product>,
    },
}

/// Token that reverts one [`AppState::apply`].
#[derive(Debug)]
#[must_use = "dropping the token makes the change permanent"]
pub struct Applied {
    undo: Undo,
}

/// Shared, observable application state.
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<RwLock<Catalog>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            catalog: Arc::new(RwLock::new(Catalog::default())),
            version: Arc::new(version),
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    /// Subscribes to change notifications. The value is a change counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Number of changes made so far.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Applies an operation to the visible state.
    pub async fn apply(&self, operation: &Operation) -> Applied {
        let undo = self.catalog.write().await.apply(operation);
        self.bump();
        Applied { undo }
    }

    /// Reverts a change made by [`apply`](Self::apply).
    pub async fn rollback(&self, applied: Applied) {
        self.catalog.write().await.undo(applied.undo);
        self.bump();
    }

    /// Replaces reference data, then re-applies every still-pending entry on top.
    ///
    /// Sales already recorded this session are kept.
    pub async fn rebuild(
        &self,
        products: Vec<Product>,
        customers: Vec<Customer>,
        pending: &[QueueEntry],
    ) {
        {
            let mut catalog = self.catalog.write().await;
            catalog.products = products.into_iter().map(|p| (p.id, p)).collect();
            catalog.customers = customers.into_iter().map(|c| (c.id, c)).collect();
            catalog.pending.clear();
            for entry in pending.iter().filter(|e| e.is_pending()) {
                let _ = catalog.apply(&entry.operation);
                catalog.pending.insert(entry.id);
            }
        }
        self.bump();
    }

    /// Rebuilds from the cache mirror plus the queue's pending entries.
    pub async fn hydrate(&self, mirror: &CacheMirror, queue: &OfflineQueue) -> SyncResult<()> {
        let products = mirror.load::<Product>().await?.items;
        let customers = mirror.load::<Customer>().await?.items;
        let pending = queue.list_pending().await?;
        self.rebuild(products, customers, &pending).await;
        Ok(())
    }

    /// Drops a sale from the session history without touching stock.
    pub async fn forget_sale(&self, id: SaleId) {
        let mut catalog = self.catalog.write().await;
        let before = catalog.sales.len();
        catalog.sales.retain(|s| s.id != id);
        let removed = catalog.sales.len() != before;
        drop(catalog);
        if removed {
            self.bump();
        }
    }

    pub async fn mark_pending(&self, id: EntryId) {
        let inserted = self.catalog.write().await.pending.insert(id);
        if inserted {
            self.bump();
        }
    }

    pub async fn clear_pending(&self, id: EntryId) {
        let removed = self.catalog.write().await.pending.remove(&id);
        if removed {
            self.bump();
        }
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Products ordered by SKU.
    pub async fn products(&self) -> Vec<Product> {
        let catalog = self.catalog.read().await;
        let mut products: Vec<Product> = catalog.products.values().cloned().collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        products
    }

    /// Customers ordered by name.
    pub async fn customers(&self) -> Vec<Customer> {
        let catalog = self.catalog.read().await;
        let mut customers: Vec<Customer> = catalog.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        customers
    }

    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.catalog.read().await.products.get(&id).cloned()
    }

    pub async fn customer(&self, id: CustomerId) -> Option<Customer> {
        self.catalog.read().await.customers.get(&id).cloned()
    }

    /// Sales in the order they were recorded.
    pub async fn sales(&self) -> Vec<Sale> {
        self.catalog.read().await.sales.clone()
    }

    /// Ids of entries awaiting sync, oldest first.
    pub async fn pending(&self) -> Vec<EntryId> {
        self.catalog.read().await.pending.iter().copied().collect()
    }

    pub async fn is_pending(&self, id: EntryId) -> bool {
        self.catalog.read().await.pending.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillsync_types::{LineItem, PaymentMethod};

    fn sale_of(product: &Product, qty: u32) -> Sale {
        Sale::from_items(
            vec![LineItem::for_product(product, qty)],
            0,
            PaymentMethod::Cash,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sale_decrements_stock_and_rolls_back() {
        let state = AppState::new();
        let product = Product::new("SKU-1", "Coffee", 350, 10);
        state.rebuild(vec![product.clone()], vec![], &[]).await;

        let applied = state.apply(&sale_of(&product, 4).into()).await;
        assert_eq!(state.product(product.id).await.unwrap().stock, 6);
        assert_eq!(state.sales().await.len(), 1);

        state.rollback(applied).await;
        assert_eq!(state.product(product.id).await.unwrap().stock, 10);
        assert!(state.sales().await.is_empty());
    }

    #[tokio::test]
    async fn rollback_restores_replaced_customer() {
        let state = AppState::new();
        let original = Customer::new("Ana");
        state.rebuild(vec![], vec![original.clone()], &[]).await;

        let mut edited = original.clone();
        edited.name = "Ana Maria".into();
        let applied = state
            .apply(&CustomerChange::Upsert(edited.clone()).into())
            .await;
        assert_eq!(state.customer(original.id).await, Some(edited));

        state.rollback(applied).await;
        assert_eq!(state.customer(original.id).await, Some(original));
    }

    #[tokio::test]
    async fn rollback_of_insert_removes_product() {
        let state = AppState::new();
        let product = Product::new("SKU-9", "Tea", 200, 1);
        let applied = state
            .apply(&ProductChange::Upsert(product.clone()).into())
            .await;
        assert!(state.product(product.id).await.is_some());

        state.rollback(applied).await;
        assert!(state.product(product.id).await.is_none());
    }

    #[tokio::test]
    async fn rebuild_overlays_pending_entries() {
        let state = AppState::new();
        let product = Product::new("SKU-1", "Coffee", 350, 10);
        let entry = QueueEntry::new(sale_of(&product, 2).into());

        state
            .rebuild(vec![product.clone()], vec![], std::slice::from_ref(&entry))
            .await;

        assert_eq!(state.product(product.id).await.unwrap().stock, 8);
        assert_eq!(state.pending().await, vec![entry.id]);

        // A second rebuild must not double-count the sale.
        state
            .rebuild(vec![product.clone()], vec![], std::slice::from_ref(&entry))
            .await;
        assert_eq!(state.product(product.id).await.unwrap().stock, 8);
        assert_eq!(state.sales().await.len(), 1);
    }

    #[tokio::test]
    async fn changes_bump_version() {
        let state = AppState::new();
        let mut rx = state.subscribe();
        let id = EntryId::new();

        state.mark_pending(id).await;
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        state.mark_pending(id).await;
        assert!(!rx.has_changed().unwrap());

        state.clear_pending(id).await;
        assert!(!state.is_pending(id).await);
        assert_eq!(state.version(), 2);
    }
}
