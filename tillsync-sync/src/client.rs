//! Offline client: wires the components together.
//!
//! [`OfflineClient`] owns one queue, monitor, cache mirror, app state,
//! recorder and synchronizer over a single storage medium and backend. It is
//! the entry point an application (or the agent CLI) uses.

use crate::backend::RemoteBackend;
use crate::cache::CacheMirror;
use crate::connectivity::{ConnectivityMonitor, ConnectivityState, NetworkStatus};
use crate::error::SyncResult;
use crate::notify::Notifier;
use crate::probe::{ProbeConfig, ReachabilityProbe};
use crate::recorder::TransactionRecorder;
use crate::state::AppState;
use crate::synchronizer::{DrainOutcome, SyncConfig, Synchronizer, spawn_auto_sync};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tillsync_storage::{KeyValueStore, OfflineQueue, SnapshotStore};
use tokio::task::JoinHandle;
use tracing::info;

/// Configuration for an [`OfflineClient`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub sync: SyncConfig,
    /// Health-check polling. `None` when the runtime supplies its own signal.
    pub probe: Option<ProbeConfig>,
    /// Start in offline mode until the first reachability reading.
    pub start_offline: bool,
}

/// Background tasks started by [`OfflineClient::spawn_background`].
///
/// Dropping this aborts them.
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Number of running tasks.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.abort();
    }
}

/// The offline transaction subsystem, assembled.
pub struct OfflineClient {
    queue: Arc<OfflineQueue>,
    monitor: ConnectivityMonitor,
    mirror: CacheMirror,
    state: AppState,
    recorder: TransactionRecorder,
    synchronizer: Arc<Synchronizer>,
    backend: Arc<dyn RemoteBackend>,
    notifier: Arc<dyn Notifier>,
    config: ClientConfig,
}

impl OfflineClient {
    /// Opens a client over `store` and hydrates app state from the cache
    /// mirror and any entries left pending by an earlier session.
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn RemoteBackend>,
        notifier: Arc<dyn Notifier>,
        config: ClientConfig,
    ) -> SyncResult<Self> {
        let queue = Arc::new(OfflineQueue::new(Arc::clone(&store)));
        let initial = NetworkStatus::from_online(!config.start_offline);
        let monitor = ConnectivityMonitor::new(initial, Arc::clone(&queue));
        let mirror = CacheMirror::new(SnapshotStore::new(store), monitor.clone());
        let state = AppState::new();
        state.hydrate(&mirror, &queue).await?;

        let recorder = TransactionRecorder::new(
            Arc::clone(&queue),
            monitor.clone(),
            mirror.clone(),
            state.clone(),
            Arc::clone(&backend),
        );
        let synchronizer = Arc::new(Synchronizer::new(
            Arc::clone(&queue),
            monitor.clone(),
            mirror.clone(),
            state.clone(),
            Arc::clone(&backend),
            Arc::clone(&notifier),
            config.sync.clone(),
        ));

        let pending = state.pending().await.len();
        info!(
            "Offline client ready ({} backend, {} pending, {})",
            backend.backend_name(),
            pending,
            monitor.status()
        );

        Ok(Self {
            queue,
            monitor,
            mirror,
            state,
            recorder,
            synchronizer,
            backend,
            notifier,
            config,
        })
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn mirror(&self) -> &CacheMirror {
        &self.mirror
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn recorder(&self) -> &TransactionRecorder {
        &self.recorder
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.synchronizer
    }

    pub fn backend(&self) -> &Arc<dyn RemoteBackend> {
        &self.backend
    }

    /// Offline flag and pending count.
    pub async fn status(&self) -> SyncResult<ConnectivityState> {
        self.monitor.state().await
    }

    /// The manual "Sync Now" action.
    pub async fn sync_now(&self) -> SyncResult<DrainOutcome> {
        self.synchronizer.drain().await
    }

    /// Starts auto-sync on reconnect and, if configured, the reachability probe.
    pub fn spawn_background(&self) -> BackgroundTasks {
        let mut handles = vec![spawn_auto_sync(
            &self.monitor,
            Arc::clone(&self.synchronizer),
            Arc::clone(&self.notifier),
        )];
        if let Some(probe_config) = &self.config.probe {
            let probe = Arc::new(ReachabilityProbe::new(
                Arc::clone(&self.backend),
                self.monitor.clone(),
                probe_config.clone(),
            ));
            handles.push(probe.spawn());
        }
        BackgroundTasks { handles }
    }
}
