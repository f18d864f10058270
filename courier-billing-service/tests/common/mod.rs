//! Common test utilities for courier-billing-service integration tests.

use courier_billing_service::config::{BillingConfig, BillingSettings, DatabaseConfig};
use courier_billing_service::models::Party;
use courier_billing_service::startup::Application;
use service_core::config::Config as CommonConfig;
use sqlx::PgPool;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,courier_billing_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config(database_url: String) -> BillingConfig {
    BillingConfig {
        common: CommonConfig { port: 0 },
        service_name: "courier-billing-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: database_url,
            max_connections: 4,
            min_connections: 1,
        },
        billing: BillingSettings::default(),
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub http_port: u16,
    pub pool: PgPool,
    pub client: reqwest::Client,
}

/// Spawn the application against `TEST_DATABASE_URL`, applying migrations.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to a Postgres database for integration tests");

    let app = Application::build(test_config(database_url))
        .await
        .expect("Failed to build application");

    let http_port = app.http_port();
    let pool = app.db().pool().clone();

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let address = format!("http://127.0.0.1:{}", http_port);
    let client = reqwest::Client::new();

    // Wait for server to be ready with retry
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/health", address)).send().await {
            Ok(_) => break,
            Err(_) if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Server not reachable after 20 attempts: {}", e),
        }
    }

    TestApp {
        address,
        http_port,
        pool,
        client,
    }
}

#[allow(dead_code)]
impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("X-User-ID", "test-operator")
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn put_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .header("X-User-ID", "test-operator")
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .header("X-User-ID", "test-operator")
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Insert a party directly; parties are otherwise created by reconciliation.
    pub async fn create_party(&self, name: &str) -> Uuid {
        let party_id = Uuid::new_v4();
        sqlx::query("INSERT INTO parties (party_id, name, normalized_name) VALUES ($1, $2, $3)")
            .bind(party_id)
            .bind(name)
            .bind(Party::normalize_name(name))
            .execute(&self.pool)
            .await
            .expect("Failed to insert party");
        party_id
    }

    pub async fn id_for(&self, table: &str, id_column: &str, code: &str) -> i32 {
        let sql = format!("SELECT {} FROM {} WHERE code = $1", id_column, table);
        sqlx::query_scalar::<_, i32>(&sql)
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to look up reference id")
    }

    pub async fn weight_slab_id(&self, label: &str) -> i32 {
        sqlx::query_scalar::<_, i32>("SELECT weight_slab_id FROM weight_slabs WHERE label = $1")
            .bind(label)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to look up weight slab")
    }
}

/// Party name that no other test run will reuse.
#[allow(dead_code)]
pub fn unique_party_name(prefix: &str) -> String {
    format!("{} {}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

/// Consignment number that no other test run will reuse.
#[allow(dead_code)]
pub fn unique_consignment_number() -> String {
    format!("CN{}", Uuid::new_v4().simple())
}

/// Read a money field that the API renders as a decimal string.
#[allow(dead_code)]
pub fn decimal(value: &serde_json::Value) -> rust_decimal::Decimal {
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.parse().expect("Expected a decimal value")
}
