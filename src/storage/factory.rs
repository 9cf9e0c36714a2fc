//! Backend selection and the process-wide adapter
//!
//! [`create_adapter`] picks the backend for an environment. [`AdapterSlot`]
//! memoizes one adapter; repositories receive that adapter explicitly rather
//! than reaching for global state. [`get_adapter`] / [`reset_adapter`] operate
//! on the one slot shared by the process.

use crate::config::StorageSettings;
use crate::error::StorageResult;
use crate::storage::adapter::StorageAdapter;
use crate::storage::storage_kv::RemoteKvStorage;
use crate::storage::storage_local::{LocalConfig, LocalStorage};
use once_cell::sync::Lazy;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Build the adapter for `settings`: remote key-value store in production,
/// local filesystem otherwise.
pub fn create_adapter(settings: &StorageSettings) -> StorageResult<Arc<dyn StorageAdapter>> {
    if settings.environment.is_production() {
        let storage = RemoteKvStorage::from_config(&settings.remote, settings.retry.clone())?;
        info!("using remote key-value storage");
        Ok(Arc::new(storage))
    } else {
        let storage = LocalStorage::new(LocalConfig::at(&settings.data_dir))?;
        info!(data_dir = %settings.data_dir.display(), "using local filesystem storage");
        Ok(Arc::new(storage))
    }
}

/// Lazily initialised holder of a single adapter
#[derive(Default)]
pub struct AdapterSlot {
    inner: RwLock<Option<Arc<dyn StorageAdapter>>>,
}

impl AdapterSlot {
    /// Empty slot
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Adapter currently held, if any
    pub fn current(&self) -> Option<Arc<dyn StorageAdapter>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the held adapter, creating it with `init` on first use.
    ///
    /// `init` runs at most once per empty slot even under contention. A failed
    /// `init` leaves the slot empty.
    pub fn get_or_try_init_with<F>(&self, init: F) -> StorageResult<Arc<dyn StorageAdapter>>
    where
        F: FnOnce() -> StorageResult<Arc<dyn StorageAdapter>>,
    {
        if let Some(adapter) = self.current() {
            return Ok(adapter);
        }

        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(adapter) = slot.as_ref() {
            return Ok(adapter.clone());
        }

        let adapter = init()?;
        info!(backend = %adapter.backend_type(), "storage adapter initialised");
        *slot = Some(adapter.clone());
        Ok(adapter)
    }

    /// Return the held adapter, creating it from `settings` on first use
    pub fn get_or_init(&self, settings: &StorageSettings) -> StorageResult<Arc<dyn StorageAdapter>> {
        self.get_or_try_init_with(|| create_adapter(settings))
    }

    /// Put `adapter` in the slot, returning the previous one
    pub fn replace(&self, adapter: Arc<dyn StorageAdapter>) -> Option<Arc<dyn StorageAdapter>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(adapter)
    }

    /// Empty the slot. Intended for test teardown.
    pub fn reset(&self) -> Option<Arc<dyn StorageAdapter>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

static GLOBAL_ADAPTER: Lazy<AdapterSlot> = Lazy::new(AdapterSlot::new);

/// Process-wide adapter, built from [`StorageSettings::from_env`] on first use
pub fn get_adapter() -> StorageResult<Arc<dyn StorageAdapter>> {
    GLOBAL_ADAPTER.get_or_try_init_with(|| create_adapter(&StorageSettings::from_env()))
}

/// Forget the process-wide adapter so the next [`get_adapter`] builds a new one.
///
/// Only test harnesses should call this.
pub fn reset_adapter() {
    GLOBAL_ADAPTER.reset();
}
