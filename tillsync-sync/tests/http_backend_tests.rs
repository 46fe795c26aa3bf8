use std::sync::Arc;
use std::time::Duration;
use tillsync_storage::MemoryStore;
use tillsync_sync::{
    ClientConfig, DrainOutcome, FailureKind, HttpBackend, HttpBackendConfig, NetworkStatus,
    OfflineClient, ProbeConfig, ReachabilityProbe, RemoteBackend, TracingNotifier,
};
use tillsync_types::{Customer, CustomerId, LineItem, PaymentMethod, Product, Sale};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> HttpBackend {
    HttpBackend::new(HttpBackendConfig {
        base_url: server.uri(),
        api_token: Some("till-token".into()),
        timeout_ms: 2_000,
    })
    .unwrap()
}

fn sale() -> Sale {
    let product = Product::new("COF-1", "Coffee", 350, 10);
    Sale::from_items(
        vec![LineItem::for_product(&product, 2)],
        825,
        PaymentMethod::Card,
        None,
    )
    .unwrap()
}

// ── Config defaults ─────────────────────────────────────────────

#[test]
fn http_config_default() {
    let cfg = HttpBackendConfig::default();
    assert_eq!(cfg.base_url, "http://localhost:8080");
    assert_eq!(cfg.timeout_ms, 10_000);
    assert!(cfg.api_token.is_none());
}

#[test]
fn http_config_from_partial_json() {
    let cfg: HttpBackendConfig =
        serde_json::from_str(r#"{"base_url":"https://pos.example.com"}"#).unwrap();
    assert_eq!(cfg.base_url, "https://pos.example.com");
    assert_eq!(cfg.timeout_ms, 10_000);
}

// ── Writes ──────────────────────────────────────────────────────

#[tokio::test]
async fn record_sale_posts_json_with_bearer_token() {
    let server = MockServer::start().await;
    let sale = sale();

    Mock::given(method("POST"))
        .and(path("/api/v1/sales"))
        .and(header("authorization", "Bearer till-token"))
        .and(body_json(&sale))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    backend_for(&server).record_sale(&sale).await.unwrap();
}

#[tokio::test]
async fn upsert_customer_puts_to_resource_path() {
    let server = MockServer::start().await;
    let customer = Customer::new("Ana");

    Mock::given(method("PUT"))
        .and(path(format!("/api/v1/customers/{}", customer.id)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    backend_for(&server).upsert_customer(&customer).await.unwrap();
}

#[tokio::test]
async fn delete_of_missing_record_succeeds() {
    let server = MockServer::start().await;
    let id = CustomerId::new();

    Mock::given(method("DELETE"))
        .and(path(format!("/api/v1/customers/{id}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    backend_for(&server).delete_customer(id).await.unwrap();
}

// ── Failure classification ──────────────────────────────────────

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/sales"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = backend_for(&server).record_sale(&sale()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Transient);
    assert!(err.message.contains("503"));
}

#[tokio::test]
async fn validation_error_is_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/sales"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unknown product"))
        .mount(&server)
        .await;

    let err = backend_for(&server).record_sale(&sale()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Rejected);
    assert!(err.message.ends_with("unknown product"));
}

#[tokio::test]
async fn slow_response_times_out_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(HttpBackendConfig {
        base_url: server.uri(),
        api_token: None,
        timeout_ms: 50,
    })
    .unwrap();

    let err = backend.health().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Transient);
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let backend = HttpBackend::new(HttpBackendConfig {
        base_url: "http://127.0.0.1:1".into(),
        api_token: None,
        timeout_ms: 500,
    })
    .unwrap();

    let err = backend.health().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Unreachable);
    assert!(err.is_transient());
}

#[tokio::test]
async fn probe_follows_health_endpoint() {
    let server = MockServer::start().await;
    let backend = Arc::new(backend_for(&server));
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
        backend,
        client.monitor().clone(),
        ProbeConfig {
            interval_ms: 1_000,
            failure_threshold: 2,
        },
    );

    // No route mounted yet: wiremock answers 404.
    assert_eq!(probe.check_once().await, NetworkStatus::Offline);

    Mock::given(method("GET"))
        .and(path("/health"))
        .and(header("authorization", "Bearer till-token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    assert_eq!(probe.check_once().await, NetworkStatus::Online);
    assert!(client.monitor().is_online());

    server.reset().await;
    assert_eq!(probe.check_once().await, NetworkStatus::Online);
    assert_eq!(probe.check_once().await, NetworkStatus::Offline);
}

// ── Reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_products_decodes_list() {
    let server = MockServer::start().await;
    let products = vec![
        Product::new("BAG-1", "Bagel", 275, 12),
        Product::new("COF-1", "Coffee", 350, 40),
    ];
    Mock::given(method("GET"))
        .and(path("/api/v1/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&products))
        .mount(&server)
        .await;

    let fetched = backend_for(&server).fetch_products().await.unwrap();
    assert_eq!(fetched, products);
}

#[tokio::test]
async fn garbage_body_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = backend_for(&server).fetch_customers().await.unwrap_err();
    assert!(err.is_transient());
}

// ── End to end ──────────────────────────────────────────────────

#[tokio::test]
async fn offline_sale_drains_over_http() {
    let server = MockServer::start().await;
    let sale = sale();

    Mock::given(method("POST"))
        .and(path("/api/v1/sales"))
        .and(body_json(&sale))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Product>::new()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Customer>::new()))
        .mount(&server)
        .await;

    let client = OfflineClient::open(
        Arc::new(MemoryStore::new()),
        Arc::new(backend_for(&server)),
        Arc::new(TracingNotifier),
        ClientConfig {
            start_offline: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    client.recorder().record_sale(sale).await.unwrap();
    assert_eq!(client.status().await.unwrap().pending_count, 1);

    client.monitor().set_online(true);
    match client.sync_now().await.unwrap() {
        DrainOutcome::Completed(report) => assert_eq!(report.succeeded, 1),
        other => panic!("expected completed drain, got {other:?}"),
    }
    assert_eq!(client.status().await.unwrap().pending_count, 0);
}
