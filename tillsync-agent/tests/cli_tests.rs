use pretty_assertions::assert_eq;
use std::sync::Arc;
use tillsync_agent::{
    AgentConfig, Command, execute, parse_entry_id, render_drain, render_pending, render_status,
};
use tillsync_storage::MemoryStore;
use tillsync_sync::{
    ClientConfig, ConnectivityState, DrainOutcome, DrainReport, MemoryBackend, OfflineClient,
    ProbeConfig, ReachabilityProbe, RemoteError, TracingNotifier,
};
use tillsync_types::{Customer, Operation};

struct Agent {
    backend: Arc<MemoryBackend>,
    client: OfflineClient,
    probe: ReachabilityProbe,
}

async fn agent() -> Agent {
    let backend = Arc::new(MemoryBackend::new());
    let client = OfflineClient::open(
        Arc::new(MemoryStore::new()),
        backend.clone(),
        Arc::new(TracingNotifier),
        ClientConfig {
            start_offline: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let probe = ReachabilityProbe::new(
        backend.clone(),
        client.monitor().clone(),
        ProbeConfig {
            interval_ms: 1_000,
            failure_threshold: 1,
        },
    );
    Agent {
        backend,
        client,
        probe,
    }
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn config_file_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tillsync.json");
    std::fs::write(
        &path,
        r#"{ "server": { "base_url": "https://pos.example.com" }, "client": { "sync": { "max_attempts": 3 } } }"#,
    )
    .unwrap();

    let config = AgentConfig::load(&path).unwrap();
    assert_eq!(config.server.base_url, "https://pos.example.com");
    assert_eq!(config.server.timeout_ms, 10_000);
    assert_eq!(config.client.sync.max_attempts, 3);
    assert!(config.client.sync.refresh_after_drain);
    assert!(config.client.probe.is_none());
}

#[test]
fn config_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let err = AgentConfig::load(&missing).unwrap_err();
    assert!(format!("{err:#}").contains("missing.json"));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ not json").unwrap();
    let err = AgentConfig::load(&broken).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn entry_ids_are_validated() {
    assert!(parse_entry_id("not-an-id").is_err());
    let id = tillsync_types::EntryId::new();
    assert_eq!(parse_entry_id(&format!(" {id} ")).unwrap(), id);
}

// ── Rendering ───────────────────────────────────────────────────

#[test]
fn status_output_shows_banner_and_hint() {
    let offline = render_status(&ConnectivityState {
        is_offline: true,
        pending_count: 2,
    });
    assert!(offline.contains("Connectivity: offline"));
    assert!(offline.contains("Offline: 2 pending transaction(s)"));
    assert!(!offline.contains("sync-now"));

    let online = render_status(&ConnectivityState {
        is_offline: false,
        pending_count: 2,
    });
    assert!(online.contains("Run `tillsync sync-now`"));

    let idle = render_status(&ConnectivityState {
        is_offline: false,
        pending_count: 0,
    });
    assert_eq!(idle, "Connectivity: online\nPending:      0");
}

#[test]
fn drain_output_covers_each_outcome() {
    assert_eq!(render_drain(&DrainOutcome::Offline), "Offline: nothing was synced");
    assert_eq!(
        render_drain(&DrainOutcome::AlreadyRunning),
        "A sync is already running"
    );
    assert_eq!(
        render_drain(&DrainOutcome::Completed(DrainReport::default())),
        "Nothing to sync"
    );
    let report = DrainReport {
        attempted: 3,
        succeeded: 3,
        ..Default::default()
    };
    assert_eq!(
        render_drain(&DrainOutcome::Completed(report)),
        "Synced 3 of 3 transaction(s)"
    );
    let cut_short = DrainReport {
        attempted: 1,
        failed: 1,
        interrupted: true,
        ..Default::default()
    };
    assert!(render_drain(&DrainOutcome::Completed(cut_short))
        .ends_with("Server unreachable; remaining transactions stay queued."));
}

#[test]
fn empty_pending_list() {
    assert_eq!(render_pending(&[]), "No pending transactions");
}

// ── Commands ────────────────────────────────────────────────────

#[tokio::test]
async fn status_probes_before_reporting() {
    let a = agent().await;
    assert!(a.client.monitor().is_offline());

    let out = execute(&a.client, &a.probe, &Command::Status).await.unwrap();
    assert!(out.starts_with("Connectivity: online"));

    a.backend.set_unreachable(true);
    let out = execute(&a.client, &a.probe, &Command::Status).await.unwrap();
    assert!(out.starts_with("Connectivity: offline"));
}

#[tokio::test]
async fn pending_then_sync_now() {
    let a = agent().await;
    a.client
        .recorder()
        .upsert_customer(Customer::new("Ana"))
        .await
        .unwrap();

    let out = execute(&a.client, &a.probe, &Command::Pending).await.unwrap();
    assert!(out.starts_with("1 pending transaction(s):"));
    assert!(out.contains("save customer Ana"));

    let out = execute(&a.client, &a.probe, &Command::SyncNow).await.unwrap();
    assert_eq!(out, "Synced 1 of 1 transaction(s)");
    assert_eq!(a.backend.applied().len(), 1);

    let out = execute(&a.client, &a.probe, &Command::Pending).await.unwrap();
    assert_eq!(out, "No pending transactions");
}

#[tokio::test]
async fn sync_now_while_unreachable_reports_offline() {
    let a = agent().await;
    a.backend.set_unreachable(true);
    a.client
        .recorder()
        .upsert_customer(Customer::new("Ana"))
        .await
        .unwrap();

    let out = execute(&a.client, &a.probe, &Command::SyncNow).await.unwrap();
    assert_eq!(out, "Offline: nothing was synced");
    assert_eq!(a.client.status().await.unwrap().pending_count, 1);
}

#[tokio::test]
async fn dead_letters_can_be_requeued_and_discarded() {
    let a = agent().await;
    a.backend.set_failure(Box::new(|op: &Operation| {
        matches!(op, Operation::CustomerChange(_)).then(|| RemoteError::rejected("duplicate email"))
    }));
    a.client
        .recorder()
        .upsert_customer(Customer::new("Ana"))
        .await
        .unwrap();

    let out = execute(&a.client, &a.probe, &Command::SyncNow).await.unwrap();
    assert!(out.starts_with("Synced 0 of 1 transaction(s), 1 failed (1 need attention)"));

    let dead = a.client.recorder().dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    let id = dead[0].id().to_string();

    let out = execute(&a.client, &a.probe, &Command::DeadLetters).await.unwrap();
    assert!(out.contains(&id));
    assert!(out.contains("duplicate email"));

    let out = execute(&a.client, &a.probe, &Command::Requeue { id: id.clone() })
        .await
        .unwrap();
    assert!(out.starts_with(&format!("Requeued {id}")));
    assert_eq!(a.client.status().await.unwrap().pending_count, 1);

    let out = execute(&a.client, &a.probe, &Command::Discard { id: id.clone() })
        .await
        .unwrap();
    assert_eq!(out, format!("Discarded {id}"));
    assert_eq!(a.client.status().await.unwrap().pending_count, 0);

    let err = execute(&a.client, &a.probe, &Command::Discard { id })
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("No pending transaction"));
}

#[tokio::test]
async fn requeue_of_unknown_id_fails() {
    let a = agent().await;
    let id = tillsync_types::EntryId::new().to_string();
    let err = execute(&a.client, &a.probe, &Command::Requeue { id })
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("No dead letter"));
}
