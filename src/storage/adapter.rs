//! Storage adapter trait

use crate::error::StorageResult;
use crate::storage::storage_api::StorageBackend;
use async_trait::async_trait;
use serde_json::Value;

/// Contract every backend implements.
///
/// Reads degrade: `get` and `exists` never fail, reporting any problem as
/// absence after logging it. Writes are loud: `set` and `delete` return a
/// classified [`StorageError`](crate::error::StorageError) naming the
/// operation and key.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Value stored under `key`, or `None` if absent or unreadable
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &Value) -> StorageResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Whether `key` currently holds a value
    async fn exists(&self, key: &str) -> bool;

    /// Check that the backend is reachable
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Get storage backend type
    fn backend_type(&self) -> StorageBackend;
}
