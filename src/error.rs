//! Error types for the json-kv-store library
//!
//! This module provides a unified error handling system using `thiserror` for
//! all components of the library. Storage failures are classified so callers
//! can tell "no space" from "permission" from "connection failed" without
//! parsing messages.

use thiserror::Error;

/// The main error type for the json-kv-store library
#[derive(Error, Debug)]
pub enum Error {
    /// Storage operation errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure category shared by every backend.
///
/// Absence is not a category: a missing key is reported as `None` / `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Access denied by the filesystem or the store
    Permission,
    /// The filesystem is mounted read-only
    ReadOnlyFilesystem,
    /// No space left on the device
    OutOfSpace,
    /// Connection refused, reset, DNS failure or other network fault
    Connectivity,
    /// The operation timed out
    Timeout,
    /// Credentials were rejected
    Authentication,
    /// The remote store ran out of memory
    OutOfMemory,
    /// Stored content could not be parsed
    MalformedData,
    /// The key is not usable
    InvalidKey,
    /// Missing or invalid configuration
    Configuration,
    /// Backend compiled out or otherwise unavailable
    Unavailable,
    /// Anything else
    Generic,
}

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage backend not available
    #[error("Storage backend not available: {backend}")]
    BackendNotAvailable { backend: String },

    /// Missing or invalid backend configuration
    #[error("Storage configuration error: {message}")]
    Configuration { message: String },

    /// Key rejected before reaching the backend
    #[error("Invalid storage key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Permission denied
    #[error("Permission denied during {operation} of '{key}': {reason}")]
    PermissionDenied {
        operation: String,
        key: String,
        reason: String,
    },

    /// Read-only filesystem
    #[error("Read-only filesystem: cannot {operation} '{key}'")]
    ReadOnlyFilesystem { operation: String, key: String },

    /// Out of disk space
    #[error("No space left on device: cannot {operation} '{key}'")]
    OutOfSpace { operation: String, key: String },

    /// Connection error
    #[error("Connection failed during {operation} of '{key}': {reason}")]
    Connectivity {
        operation: String,
        key: String,
        reason: String,
    },

    /// Timeout
    #[error("Timed out during {operation} of '{key}': {reason}")]
    Timeout {
        operation: String,
        key: String,
        reason: String,
    },

    /// Authentication failed
    #[error("Authentication failed during {operation} of '{key}': {reason}")]
    AuthenticationFailed {
        operation: String,
        key: String,
        reason: String,
    },

    /// Remote store out of memory
    #[error("Store out of memory during {operation} of '{key}': {reason}")]
    OutOfMemory {
        operation: String,
        key: String,
        reason: String,
    },

    /// Stored payload is not valid JSON
    #[error("Malformed data under '{key}': {reason}")]
    MalformedData { key: String, reason: String },

    /// Storage operation failed
    #[error("Storage operation failed: {operation} '{key}': {reason}")]
    OperationFailed {
        operation: String,
        key: String,
        reason: String,
    },
}

impl StorageError {
    /// Build the variant matching `category`, naming the operation and key.
    pub fn classified(
        category: ErrorCategory,
        operation: &str,
        key: &str,
        reason: impl Into<String>,
    ) -> Self {
        let operation = operation.to_string();
        let key = key.to_string();
        let reason = reason.into();
        match category {
            ErrorCategory::Permission => Self::PermissionDenied { operation, key, reason },
            ErrorCategory::ReadOnlyFilesystem => Self::ReadOnlyFilesystem { operation, key },
            ErrorCategory::OutOfSpace => Self::OutOfSpace { operation, key },
            ErrorCategory::Connectivity => Self::Connectivity { operation, key, reason },
            ErrorCategory::Timeout => Self::Timeout { operation, key, reason },
            ErrorCategory::Authentication => Self::AuthenticationFailed { operation, key, reason },
            ErrorCategory::OutOfMemory => Self::OutOfMemory { operation, key, reason },
            ErrorCategory::MalformedData => Self::MalformedData { key, reason },
            ErrorCategory::InvalidKey => Self::InvalidKey { key, reason },
            ErrorCategory::Configuration => Self::Configuration { message: reason },
            ErrorCategory::Unavailable => Self::BackendNotAvailable { backend: reason },
            ErrorCategory::Generic => Self::OperationFailed { operation, key, reason },
        }
    }

    /// Category of this failure
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BackendNotAvailable { .. } => ErrorCategory::Unavailable,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::InvalidKey { .. } => ErrorCategory::InvalidKey,
            Self::PermissionDenied { .. } => ErrorCategory::Permission,
            Self::ReadOnlyFilesystem { .. } => ErrorCategory::ReadOnlyFilesystem,
            Self::OutOfSpace { .. } => ErrorCategory::OutOfSpace,
            Self::Connectivity { .. } => ErrorCategory::Connectivity,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::AuthenticationFailed { .. } => ErrorCategory::Authentication,
            Self::OutOfMemory { .. } => ErrorCategory::OutOfMemory,
            Self::MalformedData { .. } => ErrorCategory::MalformedData,
            Self::OperationFailed { .. } => ErrorCategory::Generic,
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience type alias for Storage Results
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let storage_error = StorageError::OutOfSpace {
            operation: "set".to_string(),
            key: "todos".to_string(),
        };
        let error = Error::Storage(storage_error);
        assert!(error.to_string().contains("Storage error"));
        assert!(error.to_string().contains("No space left"));
        assert!(error.to_string().contains("todos"));
    }

    #[test]
    fn test_classified_round_trips_category() {
        let categories = [
            ErrorCategory::Permission,
            ErrorCategory::ReadOnlyFilesystem,
            ErrorCategory::OutOfSpace,
            ErrorCategory::Connectivity,
            ErrorCategory::Timeout,
            ErrorCategory::Authentication,
            ErrorCategory::OutOfMemory,
            ErrorCategory::MalformedData,
            ErrorCategory::InvalidKey,
            ErrorCategory::Configuration,
            ErrorCategory::Unavailable,
            ErrorCategory::Generic,
        ];
        for category in categories {
            let err = StorageError::classified(category, "set", "users", "boom");
            assert_eq!(err.category(), category);
        }
    }

    #[test]
    fn test_messages_name_operation_and_key() {
        let err = StorageError::classified(
            ErrorCategory::Connectivity,
            "delete",
            "classrooms",
            "connection refused",
        );
        let message = err.to_string();
        assert!(message.contains("delete"));
        assert!(message.contains("classrooms"));
        assert!(message.contains("connection refused"));
    }
}
