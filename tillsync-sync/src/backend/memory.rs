//! In-process remote backend.
//!
//! Keeps the remote state in memory and lets callers simulate an unreachable
//! server, per-operation failures and slow responses.

use super::remote::{RemoteBackend, RemoteError, RemoteResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tillsync_types::{
    Customer, CustomerChange, CustomerId, Operation, Product, ProductChange, ProductId, Sale,
};

/// Decides whether a given operation should fail.
pub type FailureHook = Box<dyn Fn(&Operation) -> Option<RemoteError> + Send + Sync>;

#[derive(Default)]
struct RemoteState {
    products: HashMap<ProductId, Product>,
    customers: HashMap<CustomerId, Customer>,
    sales: Vec<Sale>,
    applied: Vec<Operation>,
}

/// A remote backend held entirely in memory.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<RemoteState>,
    unreachable: AtomicBool,
    latency_ms: AtomicUsize,
    calls: AtomicUsize,
    failure: Mutex<Option<FailureHook>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product to the remote catalog without going through replay.
    pub fn seed_product(&self, product: Product) {
        if let Ok(mut state) = self.state.lock() {
            state.products.insert(product.id, product);
        }
    }

    /// Adds a customer to the remote list without going through replay.
    pub fn seed_customer(&self, customer: Customer) {
        if let Ok(mut state) = self.state.lock() {
            state.customers.insert(customer.id, customer);
        }
    }

    /// Makes every call fail as transient until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delays every write call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = usize::try_from(latency.as_millis()).unwrap_or(usize::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Installs a hook consulted before each write is applied.
    pub fn set_failure(&self, hook: FailureHook) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(hook);
        }
    }

    /// Removes the failure hook.
    pub fn clear_failure(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    /// Number of write calls received, successful or not.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Operations accepted so far, in the order they were applied.
    pub fn applied(&self) -> Vec<Operation> {
        self.state
            .lock()
            .map(|s| s.applied.clone())
            .unwrap_or_default()
    }

    /// Sales accepted so far.
    pub fn sales(&self) -> Vec<Sale> {
        self.state
            .lock()
            .map(|s| s.sales.clone())
            .unwrap_or_default()
    }

    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.products.get(&id).cloned())
    }

    pub fn customer(&self, id: CustomerId) -> Option<Customer> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.customers.get(&id).cloned())
    }

    fn check_reachable(&self) -> RemoteResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(RemoteError::unreachable("backend unreachable"))
        } else {
            Ok(())
        }
    }

    fn poisoned() -> RemoteError {
        RemoteError::transient("backend state lock poisoned")
    }

    async fn write(&self, operation: Operation) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency as u64)).await;
        }

        let injected = {
            let failure = self.failure.lock().map_err(|_| Self::poisoned())?;
            failure.as_ref().and_then(|hook| hook(&operation))
        };
        if let Some(err) = injected {
            return Err(err);
        }

        let mut state = self.state.lock().map_err(|_| Self::poisoned())?;
        match &operation {
            Operation::Sale(sale) => {
                if let Some(customer_id) = sale.customer_id {
                    if !state.customers.contains_key(&customer_id) {
                        return Err(RemoteError::rejected(format!(
                            "customer {customer_id} does not exist"
                        )));
                    }
                }
                for item in &sale.items {
                    if let Some(product) = state.products.get_mut(&item.product_id) {
                        product.stock -= i64::from(item.quantity);
                    }
                }
                state.sales.push(sale.clone());
            }
            Operation::CustomerChange(CustomerChange::Upsert(customer)) => {
                state.customers.insert(customer.id, customer.clone());
            }
            Operation::CustomerChange(CustomerChange::Delete(id)) => {
                state.customers.remove(id);
            }
            Operation::ProductChange(ProductChange::Upsert(product)) => {
                state.products.insert(product.id, product.clone());
            }
            Operation::ProductChange(ProductChange::Delete(id)) => {
                state.products.remove(id);
            }
        }
        state.applied.push(operation);
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn record_sale(&self, sale: &Sale) -> RemoteResult<()> {
        self.write(Operation::Sale(sale.clone())).await
    }

    async fn upsert_customer(&self, customer: &Customer) -> RemoteResult<()> {
        self.write(CustomerChange::Upsert(customer.clone()).into())
            .await
    }

    async fn delete_customer(&self, id: CustomerId) -> RemoteResult<()> {
        self.write(CustomerChange::Delete(id).into()).await
    }

    async fn upsert_product(&self, product: &Product) -> RemoteResult<()> {
        self.write(ProductChange::Upsert(product.clone()).into())
            .await
    }

    async fn delete_product(&self, id: ProductId) -> RemoteResult<()> {
        self.write(ProductChange::Delete(id).into()).await
    }

    async fn fetch_products(&self) -> RemoteResult<Vec<Product>> {
        self.check_reachable()?;
        let state = self.state.lock().map_err(|_| Self::poisoned())?;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }

    async fn fetch_customers(&self) -> RemoteResult<Vec<Customer>> {
        self.check_reachable()?;
        let state = self.state.lock().map_err(|_| Self::poisoned())?;
        let mut customers: Vec<Customer> = state.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn health(&self) -> RemoteResult<()> {
        self.check_reachable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailureKind, replay};
    use tillsync_types::{LineItem, PaymentMethod};

    #[tokio::test]
    async fn sale_decrements_remote_stock() {
        let backend = MemoryBackend::new();
        let product = Product::new("SKU-1", "Coffee", 350, 10);
        backend.seed_product(product.clone());

        let sale = Sale::from_items(
            vec![LineItem::for_product(&product, 3)],
            0,
            PaymentMethod::Cash,
            None,
        )
        .unwrap();
        replay(&backend, &sale.into()).await.unwrap();

        assert_eq!(backend.product(product.id).unwrap().stock, 7);
        assert_eq!(backend.sales().len(), 1);
    }

    #[tokio::test]
    async fn sale_for_unknown_customer_is_rejected() {
        let backend = MemoryBackend::new();
        let product = Product::new("SKU-1", "Coffee", 350, 10);
        let sale = Sale::from_items(
            vec![LineItem::for_product(&product, 1)],
            0,
            PaymentMethod::Card,
            Some(CustomerId::new()),
        )
        .unwrap();

        let err = backend.record_sale(&sale).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Rejected);
        assert!(backend.applied().is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_fails_transiently() {
        let backend = MemoryBackend::new();
        backend.set_unreachable(true);

        let err = backend.fetch_products().await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Unreachable);
        assert!(err.is_transient());
        assert!(backend.health().await.is_err());

        backend.set_unreachable(false);
        assert!(backend.health().await.is_ok());
    }

    #[tokio::test]
    async fn failure_hook_targets_matching_operations() {
        let backend = MemoryBackend::new();
        backend.set_failure(Box::new(|op| match op {
            Operation::CustomerChange(_) => Some(RemoteError::transient("flaky")),
            _ => None,
        }));

        assert!(backend.upsert_customer(&Customer::new("Ana")).await.is_err());
        assert!(backend
            .upsert_product(&Product::new("SKU-2", "Tea", 200, 1))
            .await
            .is_ok());

        backend.clear_failure();
        assert!(backend.upsert_customer(&Customer::new("Ana")).await.is_ok());
        assert_eq!(backend.call_count(), 3);
    }
}
