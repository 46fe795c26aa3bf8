//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
///
/// Every variant is a storage fault: the operation that hit it did not take
/// effect and the caller must surface the failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A connection mutex was poisoned by a panicking holder.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// The blocking storage task was cancelled or panicked.
    #[error("storage task failed: {0}")]
    Task(String),

    /// A key-value backend reported a failure of its own.
    #[error("backend error: {0}")]
    Backend(String),
}
