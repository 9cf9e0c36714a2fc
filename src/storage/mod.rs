//! Storage module for JSON document persistence
//!
//! This module provides a unified storage interface with multiple backend implementations:
//! - **Local filesystem storage** - one pretty-printed JSON file per key, written atomically
//! - **Remote key-value storage** - a managed store reached over REST, with retry
//!   and backoff (the HTTP client requires the `remote` feature)
//! - **Memory storage** - in-process, for tests and embedding
//!
//! All backends implement [`StorageAdapter`]: reads never fail and report
//! problems as absence, writes return classified errors.
//!
//! # Examples
//!
//! ## Local Storage
//!
//! ```rust
//! use json_kv_store::storage::{LocalConfig, LocalStorage, StorageAdapter};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let dir = tempfile::tempdir()?;
//! let storage = LocalStorage::new(LocalConfig::at(dir.path()))?;
//!
//! storage.set("todos", &json!([{"id": "1", "text": "a"}])).await?;
//! assert_eq!(storage.get("todos").await, Some(json!([{"id": "1", "text": "a"}])));
//!
//! storage.delete("todos").await?;
//! assert!(!storage.exists("todos").await);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment-selected backend
//!
//! ```rust,no_run
//! use json_kv_store::storage::{get_adapter, StorageAdapter};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // APP_ENV=production selects the remote store and requires
//! // KV_REST_API_URL and KV_REST_API_TOKEN.
//! let adapter = get_adapter()?;
//! let users = adapter.get("users").await;
//! # let _ = users;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod factory;
pub mod memory_adapter;
pub mod retry;
pub mod storage_api;
pub mod storage_kv;
pub mod storage_local;

#[cfg(feature = "remote")]
pub mod kv_rest;

pub use adapter::StorageAdapter;
pub use factory::{create_adapter, get_adapter, reset_adapter, AdapterSlot};
pub use memory_adapter::MemoryStorage;
pub use retry::{execute_with_retry, RetryPolicy};
pub use storage_api::StorageBackend;
pub use storage_kv::{ClientError, KvClient, RemoteKvStorage};
pub use storage_local::{LocalConfig, LocalStorage};

#[cfg(feature = "remote")]
pub use kv_rest::RestKvClient;

/// Storage constants
pub mod constants {
    //! Constants used throughout the storage module

    /// Maximum storage key length
    pub const MAX_KEY_LENGTH: usize = 256;

    /// Default retry attempts after the first
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Default delay before the first retry, in milliseconds
    pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

    /// Default upper bound of a single retry delay, in milliseconds
    pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_match_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, constants::DEFAULT_MAX_RETRIES);
        assert_eq!(
            policy.base_delay.as_millis() as u64,
            constants::DEFAULT_BASE_DELAY_MS
        );
        assert_eq!(
            policy.max_delay.as_millis() as u64,
            constants::DEFAULT_MAX_DELAY_MS
        );
    }
}
