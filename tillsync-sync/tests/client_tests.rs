mod common;

use common::{eventually, harness, harness_with};
use tillsync_sync::{ClientConfig, Notification, ProbeConfig};
use tillsync_types::Customer;

#[tokio::test]
async fn status_reflects_offline_flag_and_queue() {
    let h = harness().await;
    let status = h.client.status().await.unwrap();
    assert!(!status.is_offline);
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.banner(), None);

    h.go_offline();
    h.client
        .recorder()
        .upsert_customer(Customer::new("Ana"))
        .await
        .unwrap();

    let status = h.client.status().await.unwrap();
    assert!(status.is_offline);
    assert_eq!(status.pending_count, 1);
    assert!(!status.show_sync_now());

    h.go_online();
    assert!(h.client.status().await.unwrap().show_sync_now());
}

#[tokio::test]
async fn auto_sync_drains_on_reconnect() {
    let mut h = harness().await;
    let _tasks = h.client.spawn_background();

    h.go_offline();
    assert_eq!(h.next_notification().await, Notification::OfflineMode);

    for name in ["a", "b"] {
        h.client
            .recorder()
            .upsert_customer(Customer::new(name))
            .await
            .unwrap();
    }
    assert_eq!(h.pending_count().await, 2);

    h.go_online();
    assert_eq!(h.next_notification().await, Notification::BackOnline);
    assert_eq!(
        h.next_notification().await,
        Notification::SyncCompleted {
            succeeded: 2,
            failed: 0,
            dead_lettered: 0
        }
    );
    assert_eq!(h.pending_count().await, 0);
    assert_eq!(h.backend.applied().len(), 2);
}

#[tokio::test]
async fn auto_sync_drains_leftovers_at_startup() {
    let h = harness_with(ClientConfig {
        start_offline: true,
        ..Default::default()
    })
    .await;
    h.client
        .recorder()
        .upsert_customer(Customer::new("left over"))
        .await
        .unwrap();

    h.go_online();
    let _tasks = h.client.spawn_background();

    let h = &h;
    eventually(|| async move { h.backend.applied().len() == 1 }).await;
    eventually(|| async move { h.pending_count().await == 0 }).await;
}

#[tokio::test]
async fn probe_drives_connectivity_and_sync() {
    let h = harness_with(ClientConfig {
        probe: Some(ProbeConfig {
            interval_ms: 20,
            failure_threshold: 1,
        }),
        ..Default::default()
    })
    .await;
    h.backend.set_unreachable(true);
    let tasks = h.client.spawn_background();
    assert_eq!(tasks.len(), 2);

    let monitor = h.client.monitor().clone();
    eventually(|| {
        let monitor = monitor.clone();
        async move { monitor.is_offline() }
    })
    .await;

    h.client
        .recorder()
        .upsert_customer(Customer::new("Ana"))
        .await
        .unwrap();
    assert_eq!(h.pending_count().await, 1);

    h.backend.set_unreachable(false);
    let h = &h;
    eventually(|| async move { h.pending_count().await == 0 }).await;
    assert!(h.client.monitor().is_online());
}
