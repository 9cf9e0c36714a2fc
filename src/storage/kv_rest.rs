//! HTTP client for Redis-compatible REST key-value services
//!
//! Commands are POSTed to the endpoint as a JSON array (`["SET", key, value]`)
//! with a bearer token; the service answers `{"result": ...}` or
//! `{"error": "..."}`. Failures are flattened to text, status line and source
//! chain included, so the shared classifier in [`crate::storage::retry`] can
//! recognise timeouts, refused connections, 503s and rejected credentials.

use crate::error::{StorageError, StorageResult};
use crate::storage::storage_kv::{ClientError, KvClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error as _;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

fn transport_error(err: reqwest::Error) -> ClientError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if err.is_timeout() {
        ClientError::new(format!("timeout: {message}"))
    } else if err.is_connect() {
        ClientError::new(format!("network error: {message}"))
    } else {
        ClientError::new(message)
    }
}

/// REST key-value client
#[derive(Debug, Clone)]
pub struct RestKvClient {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl RestKvClient {
    /// Create a client for `url` authenticating with `token`
    pub fn new(url: &str, token: &str, timeout: Duration) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Endpoint commands are sent to
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn command(&self, args: Value) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(ClientError::new(format!(
                "HTTP {} {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
                body.trim()
            )));
        }

        let parsed: CommandResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::new(format!("malformed response from store: {e}")))?;

        match parsed.error {
            Some(error) => Err(ClientError::new(error)),
            None => Ok(parsed.result.unwrap_or(Value::Null)),
        }
    }
}

#[async_trait]
impl KvClient for RestKvClient {
    async fn get(&self, key: &str) -> Result<Option<Value>, ClientError> {
        let result = self.command(json!(["GET", key])).await?;
        Ok(match result {
            Value::Null => None,
            value => Some(value),
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.command(json!(["SET", key, value])).await.map(|_| ())
    }

    async fn del(&self, key: &str) -> Result<(), ClientError> {
        self.command(json!(["DEL", key])).await.map(|_| ())
    }

    async fn exists(&self, key: &str) -> Result<bool, ClientError> {
        let result = self.command(json!(["EXISTS", key])).await?;
        Ok(match result {
            Value::Number(n) => n.as_i64().unwrap_or(0) > 0,
            Value::Bool(b) => b,
            _ => false,
        })
    }

    async fn ping(&self) -> Result<(), ClientError> {
        self.command(json!(["PING"])).await.map(|_| ())
    }
}
