//! Error types for the sync layer.

use crate::backend::RemoteError;
use thiserror::Error;
use tillsync_storage::StorageError;
use tillsync_types::DatasetKind;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local durable store failed; the attempted operation did not happen.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The remote system refused or could not be reached during an online action.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The action needs the remote and the client is offline.
    #[error("unavailable while offline")]
    Offline,

    /// A cache snapshot write was attempted while offline.
    #[error("refusing to overwrite {0} snapshot while offline")]
    OfflineWrite(DatasetKind),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
