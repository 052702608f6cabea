//! Common test utilities for backoffice-service integration tests.
//!
//! Every test spawns its own server on an ephemeral port backed by the
//! in-memory store, so no PostgreSQL instance is required.

#![allow(dead_code)]

use backoffice_core::config::Config as CommonConfig;
use backoffice_service::config::{BackofficeConfig, DatabaseConfig, QuoteConfig, StoreBackend};
use backoffice_service::startup::Application;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,backoffice_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Test configuration using the in-memory store on an ephemeral port.
pub fn test_config() -> BackofficeConfig {
    BackofficeConfig {
        common: CommonConfig { port: 0 },
        service_name: "backoffice-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        store: StoreBackend::Memory,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        default_currency: "EUR".to_string(),
        quotes: QuoteConfig {
            enforce_transitions: true,
        },
    }
}

/// Running application plus an HTTP client pointed at it.
pub struct TestApp {
    pub address: String,
    pub http_port: u16,
    client: Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: BackofficeConfig) -> Self {
        init_tracing();

        let app = Application::build_without_migrations(config)
            .await
            .expect("Failed to build application");
        let http_port = app.http_port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let address = format!("http://127.0.0.1:{}", http_port);
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        // Wait for server to be ready with retry
        let mut attempts = 0;
        loop {
            match client.get(format!("{}/health", address)).send().await {
                Ok(resp) if resp.status().is_success() => break,
                _ if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                _ => panic!("Server did not become ready after 20 attempts"),
            }
        }

        Self {
            address,
            http_port,
            client,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Response {
        self.client
            .patch(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// POST and return the `id` of the created resource.
    pub async fn create(&self, path: &str, body: Value) -> i64 {
        let response = self.post(path, &body).await;
        assert_eq!(response.status(), 201, "POST {} failed", path);
        let created: Value = response.json().await.expect("Failed to parse response");
        created["id"].as_i64().expect("response has no id")
    }

    pub async fn create_category(&self, name: &str) -> i64 {
        self.create("/categories", json!({ "name": name })).await
    }

    pub async fn create_client(&self, name: &str) -> i64 {
        self.create("/clients", json!({ "name": name })).await
    }

    pub async fn create_supplier(&self, name: &str) -> i64 {
        self.create("/suppliers", json!({ "name": name })).await
    }

    pub async fn create_product(&self, name: &str, cost: f64, price: f64) -> i64 {
        self.create(
            "/products",
            json!({ "name": name, "costPrice": cost, "sellingPrice": price }),
        )
        .await
    }

    /// Create a client quote with a single line item.
    pub async fn create_client_quote(
        &self,
        client_id: i64,
        product_id: i64,
        quantity: i32,
        unit_price: f64,
    ) -> Value {
        let response = self
            .post(
                "/quotes/client",
                &json!({
                    "clientId": client_id,
                    "items": [
                        { "productId": product_id, "quantity": quantity, "unitPrice": unit_price }
                    ]
                }),
            )
            .await;
        assert_eq!(response.status(), 201);
        response.json().await.expect("Failed to parse response")
    }

    pub async fn set_quote_status(&self, party: &str, quote_id: i64, status: &str) -> Response {
        self.patch(
            &format!("/quotes/{}/{}/status", party, quote_id),
            &json!({ "status": status }),
        )
        .await
    }

    /// Walk a quote DRAFT -> PENDING -> CONFIRMED.
    pub async fn confirm_quote(&self, party: &str, quote_id: i64) {
        for status in ["PENDING", "CONFIRMED"] {
            let response = self.set_quote_status(party, quote_id, status).await;
            assert_eq!(response.status(), 200, "transition to {} failed", status);
        }
    }
}

/// Read an amount serialized as a decimal string.
pub fn money(value: &Value) -> f64 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("expected a decimal string amount")
}
