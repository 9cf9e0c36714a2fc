//! Memory storage adapter

use crate::error::StorageResult;
use crate::storage::adapter::StorageAdapter;
use crate::storage::storage_api::{utils, StorageBackend};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// In-memory storage adapter
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStorage {
    /// Create a new memory adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, key: &str) -> Option<Value> {
        let storage = self.data.read().unwrap_or_else(PoisonError::into_inner);
        storage.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &Value) -> StorageResult<()> {
        utils::validate_key(key)?;
        let mut storage = self.data.write().unwrap_or_else(PoisonError::into_inner);
        storage.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        utils::validate_key(key)?;
        let mut storage = self.data.write().unwrap_or_else(PoisonError::into_inner);
        storage.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        let storage = self.data.read().unwrap_or_else(PoisonError::into_inner);
        storage.contains_key(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
