//! Core type definitions for tillsync.
//!
//! This crate defines the plain data shared by every layer of the offline
//! sync subsystem:
//! - Entry and record identifiers (UUID v7)
//! - Point-of-sale records (products, customers, sales)
//! - The closed set of replayable operations and the queue entry wrapping them
//! - Cache snapshots of reference datasets
//!
//! Nothing here performs I/O.

mod entry;
mod ids;
mod operation;
mod records;
mod snapshot;

pub use entry::{DeadLetter, QueueEntry};
pub use ids::{CustomerId, EntryId, ProductId, SaleId};
pub use operation::{CustomerChange, EntryKind, Operation, ProductChange};
pub use records::{Customer, LineItem, PaymentMethod, Product, Sale};
pub use snapshot::{CacheSnapshot, CachedRecord, DatasetKind};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid sale: {0}")]
    InvalidSale(String),
}
