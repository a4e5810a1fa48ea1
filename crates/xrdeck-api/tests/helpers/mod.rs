//! Test helpers: build AppState and router for integration tests.
//!
//! Storage is a local directory under a `TempDir`; product records live in a
//! strict in-memory store so unknown products surface as errors.

#![allow(dead_code)]

use axum_test::TestServer;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;
use xrdeck_api::constants::xr_import_route;
use xrdeck_api::setup::{routes, services};
use xrdeck_core::{BaseConfig, Config, IngestSettings, ServiceConfig, StorageBackend};
use xrdeck_db::InMemoryProductStore;
use xrdeck_storage::LocalStorage;

pub const PUBLIC_BASE_URL: &str = "http://cdn.test/storage";

pub struct TestApp {
    pub server: TestServer,
    pub products: Arc<InMemoryProductStore>,
    pub storage: Arc<LocalStorage>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Register a product so record updates for it succeed.
    pub async fn create_product(&self) -> (Uuid, Uuid) {
        let (product_id, owner_id) = (Uuid::new_v4(), Uuid::new_v4());
        self.products.insert(product_id, owner_id).await;
        (product_id, owner_id)
    }
}

pub fn import_path() -> String {
    xr_import_route()
}

/// Settings tuned for fast tests: no pacing, millisecond backoff.
pub fn test_ingest_settings() -> IngestSettings {
    IngestSettings {
        batch_delay_ms: 0,
        retry_base_delay_ms: 1,
        ..IngestSettings::default()
    }
}

pub fn test_config(storage_path: &str, ingest: IngestSettings) -> Config {
    Config(Box::new(ServiceConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
            max_request_body_bytes: 16 * 1024 * 1024,
            trusted_proxy_count: 1,
            log_format: "pretty".to_string(),
        },
        database_url: None,
        db_max_connections: 1,
        storage_backend: StorageBackend::Local,
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        aws_region: None,
        local_storage_path: storage_path.to_string(),
        local_storage_base_url: PUBLIC_BASE_URL.to_string(),
        ingest,
    }))
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(test_ingest_settings()).await
}

pub async fn setup_test_app_with(ingest: IngestSettings) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let storage_path = temp_dir.path().to_string_lossy().to_string();
    let config = test_config(&storage_path, ingest);

    let storage = Arc::new(
        LocalStorage::new(storage_path.clone(), PUBLIC_BASE_URL.to_string())
            .await
            .unwrap(),
    );
    let products = Arc::new(InMemoryProductStore::strict());

    let state = services::initialize_services(&config, storage.clone(), products.clone());
    let router = routes::setup_routes(&config, state).unwrap();
    let server = TestServer::new(router).unwrap();

    TestApp {
        server,
        products,
        storage,
        _temp_dir: temp_dir,
    }
}

/// Decode every `data:` frame of a `text/event-stream` body.
pub fn parse_events(body: &str) -> Vec<Value> {
    body.split("\n\n")
        .flat_map(|frame| frame.lines())
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|json| serde_json::from_str(json.trim_start()).unwrap())
        .collect()
}

/// The single terminal event of a stream, asserting there is exactly one and
/// that it is last.
pub fn terminal_event(events: &[Value]) -> &Value {
    let terminal: Vec<&Value> = events
        .iter()
        .filter(|e| e["type"] == "complete" || e["type"] == "error")
        .collect();
    assert_eq!(terminal.len(), 1, "expected one terminal event: {:?}", events);
    let last = events.last().unwrap();
    assert_eq!(last, terminal[0]);
    last
}
