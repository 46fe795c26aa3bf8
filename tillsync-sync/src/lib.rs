//! Offline transaction recording and queue synchronization for tillsync.
//!
//! While the network is down, user actions (sales, customer edits, product
//! edits) are applied to local state immediately and queued durably. When
//! connectivity returns, the queue is replayed against the remote in the
//! order the actions were taken.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Connectivity**: [`ConnectivityMonitor`] holds the online/offline flag
//!   and fans transitions out to subscribers; [`ReachabilityProbe`] feeds it
//!   from a periodic health check
//! - **Cache**: [`CacheMirror`] keeps the last good copy of products and
//!   customers for offline reads and only writes while online
//! - **Recorder**: [`TransactionRecorder`] decides per action whether to call
//!   the remote directly or apply optimistically and queue
//! - **Synchronizer**: [`Synchronizer`] drains the queue, one pass at a time
//! - **Backend**: [`RemoteBackend`] is the remote system; [`HttpBackend`]
//!   talks JSON over HTTP and [`MemoryBackend`] keeps everything in process
//! - **State**: [`AppState`] is the observable in-memory view screens read
//!
//! [`OfflineClient`] assembles all of the above over one storage medium.
//!
//! ## Failure policy
//!
//! A replay that fails transiently stays queued for the next trigger. A
//! replay the remote rejects, or one that has failed
//! [`SyncConfig::max_attempts`] times, moves to the dead-letter list where it
//! stays until the user requeues or discards it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tillsync_storage::MemoryStore;
//! use tillsync_sync::{ClientConfig, MemoryBackend, OfflineClient, TracingNotifier};
//! use tillsync_types::{Customer, CustomerChange};
//!
//! # async fn demo() -> tillsync_sync::SyncResult<()> {
//! let client = OfflineClient::open(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(TracingNotifier),
//!     ClientConfig::default(),
//! )
//! .await?;
//!
//! client.monitor().set_online(false);
//! client
//!     .recorder()
//!     .record(CustomerChange::Upsert(Customer::new("Ana")).into())
//!     .await?;
//!
//! client.monitor().set_online(true);
//! client.sync_now().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod cache;
mod client;
mod connectivity;
mod error;
pub mod notify;
mod probe;
mod recorder;
mod state;
mod synchronizer;

pub use backend::{
    FailureKind, HttpBackend, HttpBackendConfig, MemoryBackend, RemoteBackend, RemoteError,
    RemoteResult, replay,
};
pub use cache::{CacheMirror, RefreshedData};
pub use client::{BackgroundTasks, ClientConfig, OfflineClient};
pub use connectivity::{ConnectivityMonitor, ConnectivityState, NetworkStatus};
pub use error::{SyncError, SyncResult};
pub use notify::{BroadcastNotifier, Notification, Notifier, TracingNotifier};
pub use probe::{ProbeConfig, ReachabilityProbe};
pub use recorder::{RecordOutcome, TransactionRecorder};
pub use state::{AppState, Applied};
pub use synchronizer::{
    DrainOutcome, DrainReport, ReplayFailure, SyncConfig, SyncPhase, Synchronizer,
    spawn_auto_sync,
};
