//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p imgshift-api`. No external services are
//! needed; the payment provider is scripted in memory and scratch files live in a
//! temporary directory.

#![allow(dead_code)]

pub mod fixtures;
pub mod payments;

use axum_test::TestServer;
use imgshift_api::setup::{routes, services};
use imgshift_core::Config;
use imgshift_processing::ImageTranscoder;
use payments::ScriptedProvider;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const PUBLIC_BASE_URL: &str = "http://imgshift.test";

/// Test application: server, scripted provider, and the scratch directory.
pub struct TestApp {
    pub server: TestServer,
    pub provider: Arc<ScriptedProvider>,
    pub _temp_dir: TempDir,
    scratch_dir: std::path::PathBuf,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Files currently in the scratch directory. Every request must leave zero.
    pub fn scratch_file_count(&self) -> usize {
        std::fs::read_dir(&self.scratch_dir)
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0)
    }
}

fn test_config(scratch_dir: &Path) -> Config {
    let mut env = HashMap::new();
    env.insert("STRIPE_SECRET_KEY", "sk_test_integration".to_string());
    env.insert("SCRATCH_DIR", scratch_dir.display().to_string());
    env.insert("MAX_FILE_SIZE_MB", "1".to_string());
    env.insert("PUBLIC_BASE_URL", PUBLIC_BASE_URL.to_string());
    env.insert("TRANSCODE_TIMEOUT_SECS", "120".to_string());
    env.insert("PAYMENT_TIMEOUT_SECS", "5".to_string());
    env.insert("CORS_ORIGINS", "*".to_string());

    let config = Config::from_lookup(|key| env.get(key).cloned())
        .expect("test configuration should load");
    config.validate().expect("test configuration should validate");
    config
}

/// Setup a test app around the given scripted provider.
pub async fn setup_test_app_with(provider: ScriptedProvider) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let scratch_dir = temp_dir.path().join("scratch");
    let config = test_config(&scratch_dir);

    let provider = Arc::new(provider);
    let state = services::build_state(
        &config,
        provider.clone(),
        Arc::new(ImageTranscoder::new()),
    )
    .await
    .expect("Failed to build app state");

    let router = routes::setup_routes(&config, state).expect("Failed to setup routes");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        provider,
        _temp_dir: temp_dir,
        scratch_dir,
    }
}

/// Setup a test app with a provider that knows no sessions.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(ScriptedProvider::default()).await
}
