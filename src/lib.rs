//! # json-kv-store
//!
//! Persistence for application data modules (todo lists, users, classrooms,
//! message logs) that store whole JSON values under a logical key. The backing
//! store is a local directory in development and a managed remote key-value
//! service in production; callers only see the [`StorageAdapter`] contract.
//!
//! ## Features
//!
//! - **Storage Module**: filesystem, remote key-value and memory backends behind
//!   one adapter trait, with atomic file writes and retried remote calls
//! - **Repository Module**: collections stored under one key, with self-healing
//!   loads and a FIFO write queue per key so concurrent updates are never lost
//! - **Config Module**: environment-driven backend selection
//!
//! ## Optional Features
//!
//! - `remote` (default): HTTP client for the remote key-value backend
//!
//! ## Example
//!
//! ```rust
//! use json_kv_store::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> json_kv_store::Result<()> {
//! let context = StorageContext::new(Arc::new(MemoryStorage::new()));
//! let todos = context.collection::<String>("todos");
//!
//! todos.push("write the docs".to_string()).await?;
//! assert_eq!(todos.load().await, vec!["write the docs".to_string()]);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export core error types
pub use error::{Error, Result};
pub use storage::StorageAdapter;

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod repository;
pub mod storage;

// Re-export commonly used types
pub mod prelude {
    //! Common types and traits for convenient importing

    pub use crate::config::{Environment, StorageSettings};
    pub use crate::error::{Error, ErrorCategory, Result, StorageError, StorageResult};
    pub use crate::repository::{CollectionRepository, StorageContext};
    pub use crate::storage::{
        get_adapter, reset_adapter, LocalConfig, LocalStorage, MemoryStorage, RemoteKvStorage,
        StorageAdapter, StorageBackend,
    };
}

// Version information
/// The version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(CRATE_NAME, "json-kv-store");
    }
}
