//! Repository for a whole collection stored under one key

use crate::error::{StorageError, StorageResult};
use crate::repository::write_queue::WriteQueue;
use crate::storage::adapter::StorageAdapter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{error, warn};

enum Decoded<T> {
    Items(Vec<T>),
    Missing,
    Invalid(String),
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> Decoded<T> {
    match value {
        None => Decoded::Missing,
        Some(value @ Value::Array(_)) => match serde_json::from_value(value) {
            Ok(items) => Decoded::Items(items),
            Err(e) => Decoded::Invalid(format!("items do not match the record type: {e}")),
        },
        Some(other) => Decoded::Invalid(format!("expected a JSON array, found {}", kind(&other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A `Vec<T>` persisted as one JSON array under `key`.
///
/// Reads go straight to the adapter. Every write takes a turn on the
/// collection's [`WriteQueue`], so concurrent writers are applied one after
/// another in call order and [`update`](Self::update) sees the result of the
/// previous write.
pub struct CollectionRepository<T> {
    key: String,
    adapter: Arc<dyn StorageAdapter>,
    queue: WriteQueue,
    _records: PhantomData<fn() -> T>,
}

impl<T> Clone for CollectionRepository<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            adapter: self.adapter.clone(),
            queue: self.queue.clone(),
            _records: PhantomData,
        }
    }
}

impl<T> CollectionRepository<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    /// Repository over `key` with its own write queue
    pub fn new(adapter: Arc<dyn StorageAdapter>, key: impl Into<String>) -> Self {
        Self::with_queue(adapter, key, WriteQueue::new())
    }

    /// Repository over `key` sharing `queue` with other handles to the same key
    pub fn with_queue(
        adapter: Arc<dyn StorageAdapter>,
        key: impl Into<String>,
        queue: WriteQueue,
    ) -> Self {
        Self {
            key: key.into(),
            adapter,
            queue,
            _records: PhantomData,
        }
    }

    /// Storage key of the collection
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current records.
    ///
    /// Missing or unreadable data counts as an empty collection and an empty
    /// array is written back. Wrong-shaped data is discarded with a warning.
    pub async fn load(&self) -> Vec<T> {
        if let Decoded::Items(items) = decode(self.adapter.get(&self.key).await) {
            return items;
        }

        // Re-check inside a turn so a write that landed meanwhile is not clobbered.
        let _turn = self.queue.acquire().await;
        match decode(self.adapter.get(&self.key).await) {
            Decoded::Items(items) => items,
            Decoded::Missing => {
                self.write_empty().await;
                Vec::new()
            }
            Decoded::Invalid(reason) => {
                warn!(key = %self.key, %reason, "discarding unreadable collection and resetting it to empty");
                self.write_empty().await;
                Vec::new()
            }
        }
    }

    async fn write_empty(&self) {
        if let Err(e) = self.adapter.set(&self.key, &Value::Array(Vec::new())).await {
            error!(key = %self.key, error = %e, "failed to initialise empty collection");
        }
    }

    fn encode(&self, items: &[T]) -> StorageResult<Value> {
        serde_json::to_value(items).map_err(|e| StorageError::OperationFailed {
            operation: "serialize".to_string(),
            key: self.key.clone(),
            reason: e.to_string(),
        })
    }

    /// Replace the whole collection
    pub async fn save(&self, items: &[T]) -> StorageResult<()> {
        let value = self.encode(items)?;
        let _turn = self.queue.acquire().await;
        self.adapter.set(&self.key, &value).await
    }

    /// Read, modify and write the collection as one queued step.
    ///
    /// Returns whatever `mutate` returns once the write has succeeded.
    pub async fn update<F, R>(&self, mutate: F) -> StorageResult<R>
    where
        F: FnOnce(&mut Vec<T>) -> R + Send,
        R: Send,
    {
        let _turn = self.queue.acquire().await;

        let mut items = match decode(self.adapter.get(&self.key).await) {
            Decoded::Items(items) => items,
            Decoded::Missing => Vec::new(),
            Decoded::Invalid(reason) => {
                warn!(key = %self.key, %reason, "discarding unreadable collection before update");
                Vec::new()
            }
        };

        let output = mutate(&mut items);
        let value = self.encode(&items)?;
        self.adapter.set(&self.key, &value).await?;
        Ok(output)
    }

    /// Append one record
    pub async fn push(&self, item: T) -> StorageResult<()> {
        self.update(move |items| items.push(item)).await
    }

    /// Delete the collection's key
    pub async fn clear(&self) -> StorageResult<()> {
        let _turn = self.queue.acquire().await;
        self.adapter.delete(&self.key).await
    }
}
