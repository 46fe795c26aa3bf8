//! Shared test helpers for sync tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tillsync_storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};
use tillsync_sync::{
    BroadcastNotifier, ClientConfig, MemoryBackend, Notification, OfflineClient,
};
use tillsync_types::{LineItem, PaymentMethod, Product, Sale};
use tokio::sync::broadcast;

/// A memory store whose writes can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Backend("disk full".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check()?;
        self.inner.put(key, value)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.check()?;
        self.inner.delete(key)
    }

    fn put_batch(&self, entries: &[(&str, String)]) -> StorageResult<()> {
        self.check()?;
        self.inner.put_batch(entries)
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub backend: Arc<MemoryBackend>,
    pub notifier: Arc<BroadcastNotifier>,
    pub notifications: broadcast::Receiver<Notification>,
    pub client: OfflineClient,
}

/// An online client over a fresh store and in-memory backend.
pub async fn harness() -> Harness {
    harness_with(ClientConfig::default()).await
}

pub async fn harness_with(config: ClientConfig) -> Harness {
    let store = Arc::new(FlakyStore::default());
    let backend = Arc::new(MemoryBackend::new());
    let notifier = Arc::new(BroadcastNotifier::new(64));
    let notifications = notifier.subscribe();
    let client = OfflineClient::open(store.clone(), backend.clone(), notifier.clone(), config)
        .await
        .unwrap();
    Harness {
        store,
        backend,
        notifier,
        notifications,
        client,
    }
}

impl Harness {
    /// Seeds the remote with `products` and pulls them into the mirror and state.
    pub async fn prime(&self, products: &[Product]) {
        for product in products {
            self.backend.seed_product(product.clone());
        }
        let client = &self.client;
        client.mirror().refresh(self.backend.as_ref()).await.unwrap();
        client
            .state()
            .hydrate(client.mirror(), client.queue())
            .await
            .unwrap();
    }

    pub fn go_offline(&self) {
        self.client.monitor().set_online(false);
    }

    pub fn go_online(&self) {
        self.client.monitor().set_online(true);
    }

    pub async fn pending_count(&self) -> usize {
        self.client.status().await.unwrap().pending_count
    }

    /// Everything notified so far.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let mut seen = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            seen.push(n);
        }
        seen
    }

    /// Waits for the next notification.
    pub async fn next_notification(&mut self) -> Notification {
        tokio::time::timeout(Duration::from_secs(5), self.notifications.recv())
            .await
            .expect("timed out waiting for notification")
            .unwrap()
    }
}

pub fn coffee() -> Product {
    Product::new("COF-1", "Coffee", 350, 10)
}

pub fn sale_of(product: &Product, quantity: u32) -> Sale {
    Sale::from_items(
        vec![LineItem::for_product(product, quantity)],
        0,
        PaymentMethod::Cash,
        None,
    )
    .unwrap()
}

/// Polls `check` until it returns true or a few seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met in time");
}
