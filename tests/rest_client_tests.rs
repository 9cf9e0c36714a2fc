//! Remote key-value backend against a mock REST service

#![cfg(feature = "remote")]

use httpmock::prelude::*;
use json_kv_store::prelude::*;
use json_kv_store::storage::{RestKvClient, RetryPolicy};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const TOKEN: &str = "test-token";

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(1),
        multiplier: 2,
        max_delay: Duration::from_millis(10),
        max_retries: 3,
    }
}

fn remote_storage(server: &MockServer) -> RemoteKvStorage {
    let client = RestKvClient::new(&server.base_url(), TOKEN, Duration::from_secs(5))
        .expect("Failed to build client");
    RemoteKvStorage::with_client(Arc::new(client), fast_policy())
}

#[tokio::test]
async fn test_get_parses_stored_json_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/")
                .header("authorization", format!("Bearer {TOKEN}"))
                .json_body(json!(["GET", "todos"]));
            then.status(200)
                .json_body(json!({"result": "[{\"id\":\"1\",\"text\":\"a\"}]"}));
        })
        .await;

    let storage = remote_storage(&server);
    assert_eq!(
        storage.get("todos").await,
        Some(json!([{"id": "1", "text": "a"}]))
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_missing_key_is_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).json_body(json!(["GET", "nonexistent"]));
            then.status(200).json_body(json!({"result": null}));
        })
        .await;

    let storage = remote_storage(&server);
    assert_eq!(storage.get("nonexistent").await, None);
}

#[tokio::test]
async fn test_set_sends_serialized_value() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/")
                .json_body(json!(["SET", "todos", "[{\"id\":\"1\",\"text\":\"a\"}]"]));
            then.status(200).json_body(json!({"result": "OK"}));
        })
        .await;

    let storage = remote_storage(&server);
    storage
        .set("todos", &json!([{"id": "1", "text": "a"}]))
        .await
        .expect("Failed to store todos");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_exists_and_delete() {
    let server = MockServer::start_async().await;
    let exists = server
        .mock_async(|when, then| {
            when.method(POST).json_body(json!(["EXISTS", "users"]));
            then.status(200).json_body(json!({"result": 1}));
        })
        .await;
    let del = server
        .mock_async(|when, then| {
            when.method(POST).json_body(json!(["DEL", "users"]));
            then.status(200).json_body(json!({"result": 0}));
        })
        .await;

    let storage = remote_storage(&server);
    assert!(storage.exists("users").await);
    storage.delete("users").await.expect("Delete failed");

    exists.assert_async().await;
    del.assert_async().await;
}

#[tokio::test]
async fn test_rejected_credentials_fail_without_retry() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(401).body("Unauthorized");
        })
        .await;

    let storage = remote_storage(&server);
    let err = storage.set("todos", &json!([])).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Authentication);
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_unavailable_service_is_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(503).body("Service Unavailable");
        })
        .await;

    let storage = remote_storage(&server);
    let err = storage.set("todos", &json!([])).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Connectivity);
    mock.assert_hits_async(4).await;
}

#[tokio::test]
async fn test_read_failure_is_reported_as_absent() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(503).body("Service Unavailable");
        })
        .await;

    let storage = remote_storage(&server);
    assert_eq!(storage.get("todos").await, None);
    assert!(!storage.exists("todos").await);
    mock.assert_hits_async(8).await;
}

#[tokio::test]
async fn test_store_error_reply_surfaces() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200)
                .json_body(json!({"error": "OOM command not allowed when used memory > 'maxmemory'"}));
        })
        .await;

    let storage = remote_storage(&server);
    let err = storage.set("todos", &json!([])).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::OutOfMemory);
}

#[tokio::test]
async fn test_health_check_pings() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).json_body(json!(["PING"]));
            then.status(200).json_body(json!({"result": "PONG"}));
        })
        .await;

    let storage = remote_storage(&server);
    storage.health_check().await.expect("Health check failed");
    assert_eq!(storage.backend_type(), StorageBackend::RemoteKv);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_refused_connection_is_connectivity() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client =
        RestKvClient::new(&format!("http://127.0.0.1:{port}"), TOKEN, Duration::from_secs(2))
            .unwrap();
    let storage = RemoteKvStorage::with_client(Arc::new(client), fast_policy());

    let err = storage.set("todos", &json!([])).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connectivity);
}
