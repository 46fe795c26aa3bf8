//! Durable FIFO queue of operations recorded while offline.
//!
//! The pending list is stored as one JSON array under
//! [`keys::PENDING_QUEUE`](crate::keys::PENDING_QUEUE), in append order.
//! Parked entries live in a second array under
//! [`keys::DEAD_LETTERS`](crate::keys::DEAD_LETTERS).
//!
//! Every mutation is a read-modify-write of those arrays, serialized by an
//! async mutex so an append racing a removal can never lose either change.
//! The lock guard travels into the blocking task, so a caller that stops
//! awaiting a mutation does not release the lock while the write is still
//! running.
//! A mutation that turns out to be a no-op (unknown id, already synced) does
//! not write at all.

use crate::error::StorageResult;
use crate::keys;
use crate::kv::{KeyValueStore, get_json, to_json};
use crate::run_blocking;
use std::sync::Arc;
use tillsync_types::{DeadLetter, EntryId, Operation, QueueEntry};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The local durable queue.
pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

/// Both persisted lists, loaded together for cross-list moves.
struct Lists {
    pending: Vec<QueueEntry>,
    dead: Vec<DeadLetter>,
}

fn load_pending(store: &dyn KeyValueStore) -> StorageResult<Vec<QueueEntry>> {
    Ok(get_json(store, keys::PENDING_QUEUE)?.unwrap_or_default())
}

fn load_dead(store: &dyn KeyValueStore) -> StorageResult<Vec<DeadLetter>> {
    Ok(get_json(store, keys::DEAD_LETTERS)?.unwrap_or_default())
}

impl OfflineQueue {
    /// Creates a queue over the given storage medium.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    // ── Internal read-modify-write helpers ───────────────────────

    /// Applies `f` to the pending list and persists it if `f` reports a change.
    async fn mutate_pending<R, F>(&self, f: F) -> StorageResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Vec<QueueEntry>) -> (R, bool) + Send + 'static,
    {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        run_blocking(&self.store, move |store| {
            let _guard = guard;
            let mut pending = load_pending(store)?;
            let (result, dirty) = f(&mut pending);
            if dirty {
                store.put(keys::PENDING_QUEUE, &to_json(&pending)?)?;
            }
            Ok(result)
        })
        .await
    }

    /// Applies `f` to both lists and persists them in one batch if changed.
    async fn mutate_lists<R, F>(&self, f: F) -> StorageResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Lists) -> (R, bool) + Send + 'static,
    {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        run_blocking(&self.store, move |store| {
            let _guard = guard;
            let mut lists = Lists {
                pending: load_pending(store)?,
                dead: load_dead(store)?,
            };
            let (result, dirty) = f(&mut lists);
            if dirty {
                store.put_batch(&[
                    (keys::DEAD_LETTERS, to_json(&lists.dead)?),
                    (keys::PENDING_QUEUE, to_json(&lists.pending)?),
                ])?;
            }
            Ok(result)
        })
        .await
    }

    // ── Write path ───────────────────────────────────────────────

    /// Appends an operation to the tail of the queue.
    ///
    /// Returns the stored entry with its generated id. A storage fault is
    /// returned as an error; nothing is reported as queued unless it was
    /// durably written.
    pub async fn append(&self, operation: Operation) -> StorageResult<QueueEntry> {
        self.append_entry(QueueEntry::new(operation)).await
    }

    /// Appends a pre-built entry to the tail of the queue.
    pub async fn append_entry(&self, entry: QueueEntry) -> StorageResult<QueueEntry> {
        let stored = entry.clone();
        self.mutate_pending(move |pending| {
            pending.push(entry);
            ((), true)
        })
        .await?;
        debug!("Queued {} entry {}", stored.kind(), stored.id);
        Ok(stored)
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Returns all unsynced entries, oldest first.
    pub async fn list_pending(&self) -> StorageResult<Vec<QueueEntry>> {
        let mut entries = self.list_all().await?;
        entries.retain(QueueEntry::is_pending);
        Ok(entries)
    }

    /// Returns every entry in the pending list, including synced ones not yet removed.
    pub async fn list_all(&self) -> StorageResult<Vec<QueueEntry>> {
        run_blocking(&self.store, load_pending).await
    }

    /// Returns the number of unsynced entries.
    pub async fn pending_count(&self) -> StorageResult<usize> {
        Ok(self.list_pending().await?.len())
    }

    /// Looks up an entry in the pending list.
    pub async fn get(&self, id: EntryId) -> StorageResult<Option<QueueEntry>> {
        Ok(self.list_all().await?.into_iter().find(|e| e.id == id))
    }

    /// Returns parked entries, oldest first.
    pub async fn list_dead_letters(&self) -> StorageResult<Vec<DeadLetter>> {
        run_blocking(&self.store, load_dead).await
    }

    // ── Synchronizer mutations ───────────────────────────────────

    /// Marks an entry as accepted by the remote system.
    ///
    /// Idempotent: returns `false` when the entry is unknown or already synced.
    pub async fn mark_synced(&self, id: EntryId) -> StorageResult<bool> {
        self.mutate_pending(move |pending| match pending.iter_mut().find(|e| e.id == id) {
            Some(entry) if !entry.synced => {
                entry.synced = true;
                (true, true)
            }
            _ => (false, false),
        })
        .await
    }

    /// Removes an entry from the pending list.
    ///
    /// Idempotent: returns `false` when the entry is not present.
    pub async fn remove(&self, id: EntryId) -> StorageResult<bool> {
        self.mutate_pending(move |pending| {
            let before = pending.len();
            pending.retain(|e| e.id != id);
            let removed = pending.len() != before;
            (removed, removed)
        })
        .await
    }

    /// Removes every synced entry, returning how many were dropped.
    pub async fn clear_all_synced(&self) -> StorageResult<usize> {
        let cleared = self
            .mutate_pending(|pending| {
                let before = pending.len();
                pending.retain(QueueEntry::is_pending);
                let cleared = before - pending.len();
                (cleared, cleared > 0)
            })
            .await?;
        if cleared > 0 {
            debug!("Cleared {} synced entries", cleared);
        }
        Ok(cleared)
    }

    /// Records a failed replay attempt.
    ///
    /// Returns the new attempt count, or `None` if the entry is unknown.
    pub async fn record_failure(
        &self,
        id: EntryId,
        error: impl Into<String>,
    ) -> StorageResult<Option<u32>> {
        let error = error.into();
        self.mutate_pending(move |pending| match pending.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.attempts = entry.attempts.saturating_add(1);
                entry.last_error = Some(error);
                (Some(entry.attempts), true)
            }
            None => (None, false),
        })
        .await
    }

    /// Stores `error` as the entry's last error without counting an attempt.
    ///
    /// Returns `false` if the entry is unknown.
    pub async fn note_error(&self, id: EntryId, error: impl Into<String>) -> StorageResult<bool> {
        let error = error.into();
        self.mutate_pending(move |pending| match pending.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.last_error = Some(error);
                (true, true)
            }
            None => (false, false),
        })
        .await
    }

    // ── Dead letters ─────────────────────────────────────────────

    /// Moves an entry from the pending list to the dead-letter list.
    ///
    /// Returns `false` if the entry is not pending.
    pub async fn move_to_dead_letter(
        &self,
        id: EntryId,
        reason: impl Into<String>,
    ) -> StorageResult<bool> {
        let reason = reason.into();
        let moved = self
            .mutate_lists(move |lists| {
                match lists.pending.iter().position(|e| e.id == id) {
                    Some(idx) => {
                        let entry = lists.pending.remove(idx);
                        lists.dead.push(DeadLetter::new(entry, reason));
                        (true, true)
                    }
                    None => (false, false),
                }
            })
            .await?;
        if moved {
            warn!("Entry {} moved to dead letters", id);
        }
        Ok(moved)
    }

    /// Moves a dead letter back to the tail of the pending list with its
    /// attempt count reset.
    pub async fn requeue_dead_letter(&self, id: EntryId) -> StorageResult<Option<QueueEntry>> {
        let requeued = self
            .mutate_lists(move |lists| match lists.dead.iter().position(|d| d.id() == id) {
                Some(idx) => {
                    let mut entry = lists.dead.remove(idx).entry;
                    entry.attempts = 0;
                    entry.last_error = None;
                    entry.synced = false;
                    lists.pending.push(entry.clone());
                    (Some(entry), true)
                }
                None => (None, false),
            })
            .await?;
        if requeued.is_some() {
            info!("Dead letter {} requeued", id);
        }
        Ok(requeued)
    }

    /// Explicit user removal from either list.
    ///
    /// Idempotent: returns `false` when the id is in neither list.
    pub async fn discard(&self, id: EntryId) -> StorageResult<bool> {
        let discarded = self
            .mutate_lists(move |lists| {
                let before = lists.pending.len() + lists.dead.len();
                lists.pending.retain(|e| e.id != id);
                lists.dead.retain(|d| d.id() != id);
                let changed = lists.pending.len() + lists.dead.len() != before;
                (changed, changed)
            })
            .await?;
        if discarded {
            info!("Entry {} discarded by user", id);
        }
        Ok(discarded)
    }
}
