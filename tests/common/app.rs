use std::sync::Arc;

use axum_test::TestServer;
use xapi::build_router;
use xapi::config::{Config, LogFormat};
use xapi::state::AppState;
use xapi::storage::InMemoryStorage;

/// Test configuration
pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "test-jwt-secret-that-is-at-least-32-characters-long".to_string(),
        jwt_expiration_hours: 24,
        host: "127.0.0.1".to_string(),
        port: 0,
        log_format: LogFormat::Text,
        request_timeout: None,
        rewrite_loopback_host: false,
    }
}

/// Test application wrapper
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test application over in-memory storage
    pub async fn new() -> Self {
        let state = AppState::with_storage(test_config(), Arc::new(InMemoryStorage::new()))
            .expect("Failed to create test app state");

        let router = build_router(state.clone());
        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, state }
    }
}
