//! Collection repositories layered over a storage adapter
//!
//! A [`StorageContext`] owns the adapter and one [`WriteQueue`] per collection
//! key. Repositories obtained from the same context for the same key share
//! that queue, so their writes are serialized together.
//!
//! ```rust,no_run
//! use json_kv_store::repository::StorageContext;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Todo {
//!     id: String,
//!     text: String,
//! }
//!
//! # async fn run() -> json_kv_store::Result<()> {
//! let context = StorageContext::from_global()?;
//! let todos = context.collection::<Todo>("todos");
//!
//! todos.push(Todo { id: "1".into(), text: "a".into() }).await?;
//! assert_eq!(todos.load().await.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod write_queue;

pub use collection::CollectionRepository;
pub use write_queue::{QueueTurn, WriteQueue};

use crate::error::StorageResult;
use crate::storage::adapter::StorageAdapter;
use crate::storage::factory::get_adapter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Adapter plus per-key write queues
#[derive(Clone)]
pub struct StorageContext {
    adapter: Arc<dyn StorageAdapter>,
    queues: Arc<Mutex<HashMap<String, WriteQueue>>>,
}

impl StorageContext {
    /// Context over an explicit adapter
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Context over the process-wide adapter
    pub fn from_global() -> StorageResult<Self> {
        Ok(Self::new(get_adapter()?))
    }

    /// Adapter backing this context
    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    /// Write queue for `key`, created on first request
    pub fn queue(&self, key: &str) -> WriteQueue {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Repository for the collection stored under `key`
    pub fn collection<T>(&self, key: &str) -> CollectionRepository<T>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        CollectionRepository::with_queue(self.adapter.clone(), key, self.queue(key))
    }
}
