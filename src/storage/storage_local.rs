//! Local filesystem storage backend implementation
//!
//! Each key is one pretty-printed JSON file, `<base_path>/<key>.json`. Writes
//! go to `<key>.json.tmp` first and are renamed over the target, so a crash
//! mid-write leaves either the old complete document or the new one, never a
//! truncated file. Writers of the same key take turns on that temp file, so
//! unqueued concurrent `set` calls each commit a whole document.

use crate::error::{ErrorCategory, StorageError, StorageResult};
use crate::storage::adapter::StorageAdapter;
use crate::storage::storage_api::{utils, StorageBackend};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

#[cfg(unix)]
mod errno {
    // Same values on Linux and macOS.
    pub const EPERM: i32 = 1;
    pub const EACCES: i32 = 13;
    pub const ENOSPC: i32 = 28;
    pub const EROFS: i32 = 30;
}

/// Local storage configuration
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Base directory for storage
    pub base_path: PathBuf,
    /// fsync the temporary file before renaming it into place
    pub sync_writes: bool,
    /// File permissions (Unix only)
    pub file_permissions: Option<u32>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(crate::config::DEFAULT_DATA_DIR),
            sync_writes: true,
            file_permissions: Some(0o644),
        }
    }
}

impl LocalConfig {
    /// Configuration rooted at `base_path` with default options
    pub fn at(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }
}

/// Category of a filesystem error.
///
/// Uses the OS error code where available and falls back to the message.
pub fn classify_io_error(err: &io::Error) -> ErrorCategory {
    #[cfg(unix)]
    match err.raw_os_error() {
        Some(errno::EROFS) => return ErrorCategory::ReadOnlyFilesystem,
        Some(errno::ENOSPC) => return ErrorCategory::OutOfSpace,
        Some(errno::EACCES) | Some(errno::EPERM) => return ErrorCategory::Permission,
        _ => {}
    }

    if err.kind() == io::ErrorKind::PermissionDenied {
        return ErrorCategory::Permission;
    }

    let text = err.to_string().to_lowercase();
    if text.contains("read-only file system") {
        ErrorCategory::ReadOnlyFilesystem
    } else if text.contains("no space left") {
        ErrorCategory::OutOfSpace
    } else {
        ErrorCategory::Generic
    }
}

fn io_failure(operation: &str, key: &str, err: &io::Error) -> StorageError {
    StorageError::classified(classify_io_error(err), operation, key, err.to_string())
}

/// Local filesystem storage backend
#[derive(Debug, Clone)]
pub struct LocalStorage {
    config: LocalConfig,
    temp_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl LocalStorage {
    /// Create a new local storage backend.
    ///
    /// The base directory is created lazily before each operation; this only
    /// rejects a base path that exists and is not a directory.
    pub fn new(config: LocalConfig) -> StorageResult<Self> {
        if let Ok(metadata) = std::fs::metadata(&config.base_path) {
            if !metadata.is_dir() {
                return Err(StorageError::Configuration {
                    message: format!(
                        "data directory {} exists but is not a directory",
                        config.base_path.display()
                    ),
                });
            }
        }

        Ok(Self {
            config,
            temp_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Base directory of this backend
    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Path of the file holding `key`
    pub fn file_path(&self, key: &str) -> PathBuf {
        self.config.base_path.join(utils::file_name(key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.config.base_path.join(utils::temp_file_name(key))
    }

    fn temp_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.temp_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    async fn ensure_dir(&self) -> io::Result<()> {
        match fs::create_dir_all(&self.config.base_path).await {
            Err(e) if e.kind() != io::ErrorKind::AlreadyExists => Err(e),
            _ => Ok(()),
        }
    }

    /// Write `contents` to the temp file and rename it over the target.
    /// The temp file is removed on failure.
    async fn write_atomic(&self, key: &str, contents: &[u8]) -> io::Result<()> {
        let target = self.file_path(key);
        let temp = self.temp_path(key);

        // One writer per temp file; held until the rename or cleanup is done.
        let lock = self.temp_lock(key);
        let _guard = lock.lock().await;

        let result = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(contents).await?;
            file.flush().await?;
            if self.config.sync_writes {
                file.sync_all().await?;
            }
            drop(file);

            #[cfg(unix)]
            if let Some(mode) = self.config.file_permissions {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&temp, std::fs::Permissions::from_mode(mode)).await?;
            }

            fs::rename(&temp, &target).await
        }
        .await;

        if result.is_err() {
            if let Err(cleanup) = fs::remove_file(&temp).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    debug!(key, error = %cleanup, "could not remove temporary file");
                }
            }
        }
        result
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    async fn get(&self, key: &str) -> Option<Value> {
        if let Err(e) = utils::validate_key(key) {
            warn!(key, error = %e, "rejected read of invalid key");
            return None;
        }
        if let Err(e) = self.ensure_dir().await {
            error!(key, error = %e, "data directory unavailable");
            return None;
        }

        let path = self.file_path(key);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                error!(
                    key,
                    category = ?classify_io_error(&e),
                    error = %e,
                    "failed to read stored value"
                );
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "stored value is not valid JSON");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &Value) -> StorageResult<()> {
        utils::validate_key(key)?;
        self.ensure_dir()
            .await
            .map_err(|e| io_failure("set", key, &e))?;

        let contents = serde_json::to_string_pretty(value).map_err(|e| {
            StorageError::OperationFailed {
                operation: "set".to_string(),
                key: key.to_string(),
                reason: format!("failed to serialize value: {e}"),
            }
        })?;

        self.write_atomic(key, contents.as_bytes()).await.map_err(|e| {
            let err = io_failure("set", key, &e);
            error!(key, category = ?err.category(), error = %e, "failed to write value");
            err
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        utils::validate_key(key)?;
        self.ensure_dir()
            .await
            .map_err(|e| io_failure("delete", key, &e))?;

        match fs::remove_file(self.file_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_failure("delete", key, &e)),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        if utils::validate_key(key).is_err() {
            return false;
        }
        if let Err(e) = self.ensure_dir().await {
            warn!(key, error = %e, "data directory unavailable");
            return false;
        }

        match fs::try_exists(self.file_path(key)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key, error = %e, "existence check failed");
                false
            }
        }
    }

    async fn health_check(&self) -> StorageResult<()> {
        let base = self.config.base_path.display().to_string();
        self.ensure_dir()
            .await
            .map_err(|e| io_failure("health_check", &base, &e))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
