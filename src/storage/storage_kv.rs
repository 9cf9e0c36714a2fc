//! Remote key-value storage backend
//!
//! Wraps any [`KvClient`] with retry and error classification:
//! - transient failures (connection refused, timeouts, 503, rate limits) are
//!   retried with exponential backoff
//! - everything else fails on the first attempt
//! - reads degrade to absence once retries are exhausted, writes return a
//!   classified [`StorageError`]

use crate::config::RemoteConfig;
use crate::error::{StorageError, StorageResult};
use crate::storage::adapter::StorageAdapter;
use crate::storage::retry::{execute_with_retry, RetryPolicy};
use crate::storage::storage_api::{utils, StorageBackend};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

/// Error reported by a [`KvClient`]; only its text is used for classification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ClientError {
    /// Full description, including any source chain
    pub message: String,
}

impl ClientError {
    /// Create a client error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Minimal key-value client the remote backend drives
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Raw value under `key`; `None` when absent
    async fn get(&self, key: &str) -> Result<Option<Value>, ClientError>;

    /// Store `value` (already JSON-encoded) under `key`
    async fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;

    /// Remove `key`
    async fn del(&self, key: &str) -> Result<(), ClientError>;

    /// Whether `key` exists
    async fn exists(&self, key: &str) -> Result<bool, ClientError>;

    /// Round-trip to the server
    async fn ping(&self) -> Result<(), ClientError>;
}

/// Turn a raw client response into the stored value.
///
/// Structures pass through; strings are parsed as JSON and kept as-is when
/// they are not JSON.
pub fn normalize_value(raw: Value) -> Value {
    match raw {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

/// Remote key-value storage backend
pub struct RemoteKvStorage {
    client: Arc<dyn KvClient>,
    policy: RetryPolicy,
}

impl RemoteKvStorage {
    /// Build the backend over the REST client described by `config`.
    ///
    /// Missing endpoint or token fails immediately; configuration errors are
    /// never retried.
    #[cfg(feature = "remote")]
    pub fn from_config(config: &RemoteConfig, policy: RetryPolicy) -> StorageResult<Self> {
        let (url, token) = config.require()?;
        let client = crate::storage::kv_rest::RestKvClient::new(url, token, config.request_timeout)?;
        Ok(Self::with_client(Arc::new(client), policy))
    }

    /// Without the `remote` feature there is no client to build.
    #[cfg(not(feature = "remote"))]
    pub fn from_config(config: &RemoteConfig, _policy: RetryPolicy) -> StorageResult<Self> {
        config.require()?;
        Err(StorageError::BackendNotAvailable {
            backend: "remote-kv (compiled without the `remote` feature)".to_string(),
        })
    }

    /// Build the backend over an existing client
    pub fn with_client(client: Arc<dyn KvClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl StorageAdapter for RemoteKvStorage {
    async fn get(&self, key: &str) -> Option<Value> {
        if let Err(e) = utils::validate_key(key) {
            warn!(key, error = %e, "rejected read of invalid key");
            return None;
        }

        match execute_with_retry(&self.policy, "get", key, || self.client.get(key)).await {
            Ok(raw) => raw.map(normalize_value),
            Err(failure) => {
                error!(
                    key,
                    category = ?failure.category,
                    attempts = failure.attempts.len(),
                    error = %failure.message,
                    "remote read failed, treating key as absent"
                );
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &Value) -> StorageResult<()> {
        utils::validate_key(key)?;
        let encoded = serde_json::to_string(value).map_err(|e| StorageError::OperationFailed {
            operation: "set".to_string(),
            key: key.to_string(),
            reason: format!("failed to serialize value: {e}"),
        })?;

        execute_with_retry(&self.policy, "set", key, || self.client.set(key, &encoded))
            .await
            .map_err(|failure| {
                error!(key, category = ?failure.category, error = %failure.message, "remote write failed");
                StorageError::from(failure)
            })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        utils::validate_key(key)?;
        execute_with_retry(&self.policy, "delete", key, || self.client.del(key))
            .await
            .map_err(|failure| {
                error!(key, category = ?failure.category, error = %failure.message, "remote delete failed");
                StorageError::from(failure)
            })
    }

    async fn exists(&self, key: &str) -> bool {
        if utils::validate_key(key).is_err() {
            return false;
        }

        match execute_with_retry(&self.policy, "exists", key, || self.client.exists(key)).await {
            Ok(found) => found,
            Err(failure) => {
                warn!(
                    key,
                    category = ?failure.category,
                    error = %failure.message,
                    "remote existence check failed, reporting absent"
                );
                false
            }
        }
    }

    async fn health_check(&self) -> StorageResult<()> {
        execute_with_retry(&self.policy, "health_check", "*", || self.client.ping())
            .await
            .map_err(StorageError::from)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::RemoteKv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Client that replays scripted failures before delegating to a map.
    #[derive(Default)]
    struct ScriptedClient {
        failures: Mutex<VecDeque<String>>,
        data: Mutex<HashMap<String, Value>>,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        fn failing_with(messages: &[&str]) -> Self {
            Self {
                failures: Mutex::new(messages.iter().map(|m| m.to_string()).collect()),
                ..Default::default()
            }
        }

        fn seed(&self, key: &str, raw: Value) {
            self.data.lock().unwrap().insert(key.to_string(), raw);
        }

        fn next(&self) -> Result<(), ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failures.lock().unwrap().pop_front() {
                Some(message) => Err(ClientError::new(message)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl KvClient for ScriptedClient {
        async fn get(&self, key: &str) -> Result<Option<Value>, ClientError> {
            self.next()?;
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
            self.next()?;
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), Value::String(value.to_string()));
            Ok(())
        }

        async fn del(&self, key: &str) -> Result<(), ClientError> {
            self.next()?;
            self.data.lock().unwrap().remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> Result<bool, ClientError> {
            self.next()?;
            Ok(self.data.lock().unwrap().contains_key(key))
        }

        async fn ping(&self) -> Result<(), ClientError> {
            self.next()
        }
    }

    fn storage_over(client: ScriptedClient) -> (RemoteKvStorage, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let storage = RemoteKvStorage::with_client(client.clone(), RetryPolicy::default());
        (storage, client)
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(json!({"a": 1})), json!({"a": 1}));
        assert_eq!(normalize_value(json!("[1,2]")), json!([1, 2]));
        assert_eq!(normalize_value(json!("plain text")), json!("plain text"));
    }

    #[test]
    fn test_missing_configuration_fails_fast() {
        let err = RemoteKvStorage::from_config(&RemoteConfig::default(), RetryPolicy::default())
            .err()
            .unwrap();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_through_string_encoding() {
        let (storage, _client) = storage_over(ScriptedClient::default());

        let value = json!([{"id": "1", "text": "a"}]);
        storage.set("todos", &value).await.unwrap();
        assert_eq!(storage.get("todos").await, Some(value));
        assert!(storage.exists("todos").await);

        storage.delete("todos").await.unwrap();
        assert_eq!(storage.get("todos").await, None);
        assert!(!storage.exists("todos").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_accepts_preparsed_values() {
        let (storage, client) = storage_over(ScriptedClient::default());
        client.seed("users", json!({"ada": {"score": 3}}));

        assert_eq!(storage.get("users").await, Some(json!({"ada": {"score": 3}})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_retries_then_succeeds() {
        let (storage, client) = storage_over(ScriptedClient::failing_with(&[
            "connect ECONNREFUSED 10.0.0.1:443",
            "connect ECONNREFUSED 10.0.0.1:443",
        ]));

        storage.set("todos", &json!([])).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_failure_is_not_retried() {
        let (storage, client) =
            storage_over(ScriptedClient::failing_with(&["HTTP 401 Unauthorized: invalid token"]));

        let err = storage.set("todos", &json!([])).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_read_degrades_to_none() {
        let (storage, client) = storage_over(ScriptedClient::failing_with(&[
            "read ECONNRESET",
            "read ECONNRESET",
            "read ECONNRESET",
            "read ECONNRESET",
        ]));
        client.seed("todos", json!("[]"));

        assert_eq!(storage.get("todos").await, None);
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_delete_is_classified() {
        let (storage, _client) = storage_over(ScriptedClient::failing_with(&[
            "request timed out",
            "request timed out",
            "request timed out",
            "request timed out",
        ]));

        let err = storage.delete("todos").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(err.to_string().contains("delete"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_memory_is_classified() {
        let (storage, _client) = storage_over(ScriptedClient::failing_with(&[
            "OOM command not allowed when used memory > 'maxmemory'",
        ]));

        let err = storage.set("messages", &json!([])).await.unwrap_err();
        assert!(matches!(err, StorageError::OutOfMemory { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exists_degrades_to_false() {
        let (storage, client) =
            storage_over(ScriptedClient::failing_with(&["WRONGPASS invalid password"]));
        client.seed("todos", json!("[]"));

        assert!(!storage.exists("todos").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_retries() {
        let (storage, client) =
            storage_over(ScriptedClient::failing_with(&["HTTP 503 Service Unavailable"]));

        storage.health_check().await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(storage.backend_type(), StorageBackend::RemoteKv);
    }
}
