//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, body::Body};
use tempfile::TempDir;

use relay::ai::chat::ChatRelay;
use relay::api::{AppState, app};
use relay::core::db::async_db;
use relay::core::{AppConfig, CacheBackend};

/// App router plus the temporary directory holding its database. The
/// directory is deleted when this is dropped so keep it alive for
/// the duration of the test.
pub struct TestApp {
    pub router: Router,
    pub dir: TempDir,
}

/// Config pointing the completion client at `llm_url` and storing
/// everything in `dir`.
pub fn test_config(dir: &TempDir, llm_url: &str) -> AppConfig {
    let storage_path = dir.path().display().to_string();
    AppConfig {
        db_path: format!("{}/relay.db", storage_path),
        storage_path,
        llm_api_hostname: llm_url.to_string(),
        llm_api_key: Some(String::from("test-api-key")),
        llm_model: Some(String::from("llama-3.1-8b-instant")),
        llm_temperature: 0.2,
        llm_timeout_secs: 5,
        chat_rate_limit: 1,
        chat_rate_window_secs: 3,
        history_rate_limit: 10,
        history_rate_window_secs: 60,
        max_message_length: 500,
        cache_backend: CacheBackend::Sqlite,
        fallback_reply: String::from("Error connecting to AI"),
        persona_name: String::from("Ada"),
        resume_path: None,
        system_message: Some(String::from("You are Ada's portfolio assistant.")),
        trust_forwarded_for: false,
    }
}

/// Creates a test application router with a fresh database.
pub async fn test_app(llm_url: &str) -> TestApp {
    test_app_with(llm_url, |_| {}).await
}

/// Same as `test_app` but lets the caller tweak the config first.
pub async fn test_app_with(llm_url: &str, customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = test_config(&dir, llm_url);
    customize(&mut config);

    let db = async_db(&config.db_path)
        .await
        .expect("Failed to connect to async db");
    let relay = ChatRelay::from_config(&config, db).expect("Failed to build relay");
    let app_state = AppState::new(relay, config);

    TestApp {
        router: app(Arc::new(app_state)),
        dir,
    }
}

/// Response body for a successful completion with `content`
pub fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1694268190,
        "model": "llama-3.1-8b-instant",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not valid UTF-8")
}
