//! Cache snapshots of reference data.

use crate::{Customer, Product};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference datasets that are mirrored for offline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    Products,
    Customers,
}

impl DatasetKind {
    /// Name used in storage keys and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Customers => "customers",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record type that belongs to a mirrored dataset.
pub trait CachedRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: DatasetKind;
}

impl CachedRecord for Product {
    const KIND: DatasetKind = DatasetKind::Products;
}

impl CachedRecord for Customer {
    const KIND: DatasetKind = DatasetKind::Customers;
}

/// Last known-good copy of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot<T> {
    pub items: Vec<T>,
    /// `None` when nothing has ever been saved (cold start).
    pub last_updated: Option<DateTime<Utc>>,
}

impl<T> CacheSnapshot<T> {
    /// Captures `items` as of now.
    #[must_use]
    pub fn capture(items: Vec<T>) -> Self {
        Self {
            items,
            last_updated: Some(Utc::now()),
        }
    }

    /// Snapshot returned when no prior save exists.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            last_updated: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> Default for CacheSnapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}
