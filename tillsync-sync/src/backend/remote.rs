//! Remote backend abstraction trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tillsync_types::{
    Customer, CustomerChange, CustomerId, Operation, Product, ProductChange, ProductId, Sale,
};

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Whether a failed remote call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// No connection to the remote could be made. Says nothing about the
    /// operation itself.
    Unreachable,
    /// The remote answered but could not complete the call (timeout,
    /// overload, server error). Retry on the next trigger.
    Transient,
    /// The remote refused the operation itself. Retrying will not help.
    Rejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "unreachable"),
            Self::Transient => write!(f, "transient"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: FailureKind,
    pub message: String,
}

impl RemoteError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unreachable,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Rejected,
            message: message.into(),
        }
    }

    /// True when retrying later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, FailureKind::Unreachable | FailureKind::Transient)
    }

    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        self.kind == FailureKind::Unreachable
    }
}

/// The remote system the queue is replayed against.
///
/// Implementations rely on their transport's own timeout; callers add none.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Returns the name of the backend, for logs.
    fn backend_name(&self) -> &'static str;

    /// Records a completed sale.
    async fn record_sale(&self, sale: &Sale) -> RemoteResult<()>;

    /// Creates or replaces a customer.
    async fn upsert_customer(&self, customer: &Customer) -> RemoteResult<()>;

    /// Deletes a customer.
    async fn delete_customer(&self, id: CustomerId) -> RemoteResult<()>;

    /// Creates or replaces a product.
    async fn upsert_product(&self, product: &Product) -> RemoteResult<()>;

    /// Deletes a product.
    async fn delete_product(&self, id: ProductId) -> RemoteResult<()>;

    /// Fetches the current product catalog.
    async fn fetch_products(&self) -> RemoteResult<Vec<Product>>;

    /// Fetches the current customer list.
    async fn fetch_customers(&self) -> RemoteResult<Vec<Customer>>;

    /// Cheap reachability check.
    async fn health(&self) -> RemoteResult<()> {
        Ok(())
    }
}

/// Issues the remote call that corresponds to an operation.
pub async fn replay(backend: &dyn RemoteBackend, operation: &Operation) -> RemoteResult<()> {
    match operation {
        Operation::Sale(sale) => backend.record_sale(sale).await,
        Operation::CustomerChange(CustomerChange::Upsert(customer)) => {
            backend.upsert_customer(customer).await
        }
        Operation::CustomerChange(CustomerChange::Delete(id)) => backend.delete_customer(*id).await,
        Operation::ProductChange(ProductChange::Upsert(product)) => {
            backend.upsert_product(product).await
        }
        Operation::ProductChange(ProductChange::Delete(id)) => backend.delete_product(*id).await,
    }
}
