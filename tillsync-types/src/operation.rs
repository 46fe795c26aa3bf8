//! Replayable operations.
//!
//! An [`Operation`] is the payload of a queue entry: everything needed to
//! re-issue a user action against the remote system. The set of kinds is
//! closed, so replay code matches exhaustively and a new kind fails to
//! compile until every dispatcher handles it.

use crate::{Customer, CustomerId, Product, ProductId, Sale};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Sale,
    CustomerChange,
    ProductChange,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sale => write!(f, "sale"),
            Self::CustomerChange => write!(f, "customer_change"),
            Self::ProductChange => write!(f, "product_change"),
        }
    }
}

/// A change to a customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum CustomerChange {
    /// Create or replace the customer.
    Upsert(Customer),
    /// Remove the customer.
    Delete(CustomerId),
}

impl CustomerChange {
    /// The customer this change targets.
    #[must_use]
    pub fn customer_id(&self) -> CustomerId {
        match self {
            Self::Upsert(c) => c.id,
            Self::Delete(id) => *id,
        }
    }
}

/// A change to a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum ProductChange {
    /// Create or replace the product.
    Upsert(Product),
    /// Remove the product.
    Delete(ProductId),
}

impl ProductChange {
    /// The product this change targets.
    #[must_use]
    pub fn product_id(&self) -> ProductId {
        match self {
            Self::Upsert(p) => p.id,
            Self::Delete(id) => *id,
        }
    }
}

/// A user action that can be applied locally and replayed remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum Operation {
    Sale(Sale),
    CustomerChange(CustomerChange),
    ProductChange(ProductChange),
}

impl Operation {
    /// Returns the kind tag of this operation.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Sale(_) => EntryKind::Sale,
            Self::CustomerChange(_) => EntryKind::CustomerChange,
            Self::ProductChange(_) => EntryKind::ProductChange,
        }
    }

    /// Short human-readable description for pending-transaction lists.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Sale(sale) => format!(
                "sale of {} item(s), total {}.{:02} ({})",
                sale.unit_count(),
                sale.total_cents / 100,
                (sale.total_cents % 100).abs(),
                sale.payment_method
            ),
            Self::CustomerChange(CustomerChange::Upsert(c)) => format!("save customer {}", c.name),
            Self::CustomerChange(CustomerChange::Delete(id)) => format!("delete customer {id}"),
            Self::ProductChange(ProductChange::Upsert(p)) => format!("save product {}", p.sku),
            Self::ProductChange(ProductChange::Delete(id)) => format!("delete product {id}"),
        }
    }
}

impl From<Sale> for Operation {
    fn from(sale: Sale) -> Self {
        Self::Sale(sale)
    }
}

impl From<CustomerChange> for Operation {
    fn from(change: CustomerChange) -> Self {
        Self::CustomerChange(change)
    }
}

impl From<ProductChange> for Operation {
    fn from(change: ProductChange) -> Self {
        Self::ProductChange(change)
    }
}
