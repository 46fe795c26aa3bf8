//! Queue entries.

use crate::{EntryId, EntryKind, Operation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded user action awaiting remote confirmation.
///
/// Entries are created by the recorder, mutated only by the synchronizer
/// (`synced`, `attempts`, `last_error`) and destroyed either after a confirmed
/// replay or by explicit user removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Unique identifier for this entry.
    pub id: EntryId,

    /// What to replay.
    pub operation: Operation,

    /// When the action was captured.
    pub created_at: DateTime<Utc>,

    /// Set once the remote system has accepted the replay.
    #[serde(default)]
    pub synced: bool,

    /// Number of failed replay attempts.
    #[serde(default)]
    pub attempts: u32,

    /// Message of the most recent replay failure.
    #[serde(default)]
    pub last_error: Option<String>,
}

impl QueueEntry {
    /// Creates a new, unsynced entry for an operation.
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            id: EntryId::new(),
            operation,
            created_at: Utc::now(),
            synced: false,
            attempts: 0,
            last_error: None,
        }
    }

    /// Returns the kind tag of the wrapped operation.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.operation.kind()
    }

    /// Returns true while the entry still needs to be replayed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.synced
    }
}

/// An entry parked after a permanent rejection or too many failed attempts.
///
/// Dead letters are kept until the user requeues or discards them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub entry: QueueEntry,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Wraps an entry with the reason it was parked.
    #[must_use]
    pub fn new(entry: QueueEntry, reason: impl Into<String>) -> Self {
        Self {
            entry,
            reason: reason.into(),
            dead_lettered_at: Utc::now(),
        }
    }

    /// Id of the parked entry.
    #[must_use]
    pub fn id(&self) -> EntryId {
        self.entry.id
    }
}
