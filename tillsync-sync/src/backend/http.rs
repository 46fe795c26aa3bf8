//! HTTP/JSON remote backend.
//!
//! Endpoints, relative to `base_url`:
//!
//! | Call | Request |
//! |---|---|
//! | record sale | `POST /api/v1/sales` |
//! | upsert / delete customer | `PUT` / `DELETE /api/v1/customers/{id}` |
//! | upsert / delete product | `PUT` / `DELETE /api/v1/products/{id}` |
//! | fetch products / customers | `GET /api/v1/products`, `GET /api/v1/customers` |
//! | health | `GET /health` |
//!
//! Transport errors and HTTP 408, 429 and 5xx are transient; every other
//! non-success status is a rejection. A 404 on delete counts as success since
//! the record is already gone.

use super::remote::{RemoteBackend, RemoteError, RemoteResult};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tillsync_types::{Customer, CustomerId, Product, ProductId, Sale};
use tracing::debug;

/// HTTP backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    /// Base URL of the store server (e.g. `https://pos.example.com`).
    pub base_url: String,
    /// Bearer token sent with every request.
    pub api_token: Option<String>,
    /// Per-request timeout (ms).
    pub timeout_ms: u64,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_token: None,
            timeout_ms: 10_000,
        }
    }
}

/// Remote backend speaking JSON over HTTP.
pub struct HttpBackend {
    config: HttpBackendConfig,
    client: Client,
}

impl HttpBackend {
    /// Creates a backend with its own connection pool.
    pub fn new(config: HttpBackendConfig) -> SyncResult<Self> {
        if config.base_url.is_empty() {
            return Err(SyncError::Config("base_url must not be empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn execute(&self, request: RequestBuilder, what: &str) -> RemoteResult<Response> {
        let request = match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request.send().await.map_err(|e| {
            if e.is_connect() {
                RemoteError::unreachable(format!("{what}: {e}"))
            } else {
                RemoteError::transient(format!("{what}: {e}"))
            }
        })
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> RemoteResult<Response> {
        let response = self.execute(request, what).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, what, &body))
    }

    async fn send_delete(&self, url: String, what: &str) -> RemoteResult<()> {
        let response = self.execute(self.client.delete(url), what).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("{}: already absent remotely", what);
            return Ok(());
        }
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, what, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> RemoteResult<T> {
        let response = self.send(self.client.get(self.url(path)), what).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::transient(format!("{what}: invalid response body: {e}")))
    }
}

/// Maps a non-success status to a failure kind.
pub(crate) fn classify_status(status: StatusCode, what: &str, body: &str) -> RemoteError {
    let message = if body.is_empty() {
        format!("{what}: HTTP {}", status.as_u16())
    } else {
        format!("{what}: HTTP {}: {}", status.as_u16(), body)
    };
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        RemoteError::transient(message)
    } else {
        RemoteError::rejected(message)
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    async fn record_sale(&self, sale: &Sale) -> RemoteResult<()> {
        let request = self.client.post(self.url("/api/v1/sales")).json(sale);
        self.send(request, "record sale").await.map(|_| ())
    }

    async fn upsert_customer(&self, customer: &Customer) -> RemoteResult<()> {
        let url = self.url(&format!("/api/v1/customers/{}", customer.id));
        self.send(self.client.put(url).json(customer), "upsert customer")
            .await
            .map(|_| ())
    }

    async fn delete_customer(&self, id: CustomerId) -> RemoteResult<()> {
        let url = self.url(&format!("/api/v1/customers/{id}"));
        self.send_delete(url, "delete customer").await
    }

    async fn upsert_product(&self, product: &Product) -> RemoteResult<()> {
        let url = self.url(&format!("/api/v1/products/{}", product.id));
        self.send(self.client.put(url).json(product), "upsert product")
            .await
            .map(|_| ())
    }

    async fn delete_product(&self, id: ProductId) -> RemoteResult<()> {
        let url = self.url(&format!("/api/v1/products/{id}"));
        self.send_delete(url, "delete product").await
    }

    async fn fetch_products(&self) -> RemoteResult<Vec<Product>> {
        self.get_json("/api/v1/products", "fetch products").await
    }

    async fn fetch_customers(&self) -> RemoteResult<Vec<Customer>> {
        self.get_json("/api/v1/customers", "fetch customers").await
    }

    async fn health(&self) -> RemoteResult<()> {
        self.send(self.client.get(self.url("/health")), "health")
            .await
            .map(|_| ())
    }
}
