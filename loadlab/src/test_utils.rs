//! Test utilities for handler tests.

use std::sync::Arc;

use axum_test::TestServer;
use url::Url;

use crate::config::{Config, LoadConfig, LoadExecution, MetadataConfig, StorageBackend, StorageConfig};
use crate::load::LoadGenerator;
use crate::metadata::MetadataClient;
use crate::storage::InMemoryObjectStore;
use crate::{AppState, Application};

/// Config for tests: in-memory store, metadata endpoint on a closed local port.
pub fn create_test_config() -> Config {
    Config {
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            bucket: "test-bucket".to_string(),
            ..Default::default()
        },
        metadata: MetadataConfig {
            // Nothing listens on the discard port, so lookups fail fast
            endpoint: Url::parse("http://127.0.0.1:9").unwrap(),
            token_ttl_seconds: 60,
        },
        load: LoadConfig {
            execution: LoadExecution::Isolated,
            max_factor: None,
        },
        ..Default::default()
    }
}

/// Build a test server backed by a fresh in-memory store, returned for inspection.
pub fn create_test_app(config: Config) -> (TestServer, Arc<InMemoryObjectStore>) {
    let store = Arc::new(InMemoryObjectStore::new());
    let server = create_test_app_with_store(config, store.clone());
    (server, store)
}

pub fn create_test_app_with_store(config: Config, store: Arc<InMemoryObjectStore>) -> TestServer {
    crate::install_crypto_provider();

    let state = AppState::builder()
        .metadata(MetadataClient::new(&config.metadata))
        .store(store)
        .load(LoadGenerator::new(&config.load))
        .config(config)
        .build();

    Application::from_state(state)
        .expect("Failed to create application")
        .into_test_server()
}
