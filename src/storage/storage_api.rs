//! Shared storage types and key helpers
//!
//! Types used by every backend: the backend discriminator and key validation.

use std::fmt;

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageBackend {
    /// Local filesystem storage
    Local,
    /// Managed remote key-value store
    RemoteKv,
    /// In-process memory
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageBackend::Local => "local",
            StorageBackend::RemoteKv => "remote-kv",
            StorageBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Utility functions for storage keys
pub mod utils {
    use crate::error::{StorageError, StorageResult};
    use crate::storage::constants::MAX_KEY_LENGTH;

    fn invalid(key: &str, reason: &str) -> StorageError {
        StorageError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Validate a storage key.
    ///
    /// A key must name exactly one file inside the data directory, so path
    /// separators, the `.` and `..` names and control characters are rejected
    /// on every backend.
    pub fn validate_key(key: &str) -> StorageResult<()> {
        if key.is_empty() {
            return Err(invalid(key, "key cannot be empty"));
        }

        if key.len() > MAX_KEY_LENGTH {
            return Err(invalid(key, "key too long"));
        }

        if key.contains('/') || key.contains('\\') {
            return Err(invalid(key, "key cannot contain path separators"));
        }

        if key == "." || key == ".." {
            return Err(invalid(key, "key cannot be '.' or '..'"));
        }

        if key.chars().any(char::is_control) {
            return Err(invalid(key, "key contains control characters"));
        }

        Ok(())
    }

    /// File name holding the value of `key`
    pub fn file_name(key: &str) -> String {
        format!("{key}.json")
    }

    /// Temporary file name used while `key` is being written
    pub fn temp_file_name(key: &str) -> String {
        format!("{key}.json.tmp")
    }
}
