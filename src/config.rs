//! Runtime configuration for backend selection
//!
//! Settings are read from the process environment (after loading a `.env`
//! file with `dotenvy`) or from any lookup function, which keeps the parsing
//! testable without mutating global state.

use crate::error::{StorageError, StorageResult};
use crate::storage::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable selecting the deployment environment
pub const ENV_APP_ENV: &str = "APP_ENV";
/// Environment variable holding the filesystem data directory
pub const ENV_DATA_DIR: &str = "DATA_DIR";
/// Environment variable holding the remote store endpoint
pub const ENV_KV_URL: &str = "KV_REST_API_URL";
/// Environment variable holding the remote store access token
pub const ENV_KV_TOKEN: &str = "KV_REST_API_TOKEN";
/// Environment variable overriding the remote request timeout, in milliseconds
pub const ENV_KV_TIMEOUT_MS: &str = "KV_REQUEST_TIMEOUT_MS";

/// Default data directory for the filesystem backend
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development; filesystem backend
    #[default]
    Development,
    /// Test runs; filesystem backend
    Test,
    /// Production; remote key-value backend
    Production,
}

impl Environment {
    /// Parse an `APP_ENV` value. Unknown values fall back to development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    /// Whether the remote backend should be used
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Remote key-value store connection settings
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// REST endpoint of the store
    pub url: Option<String>,
    /// Bearer token for the store
    pub token: Option<String>,
    /// Per-request timeout enforced by the HTTP client
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RemoteConfig {
    /// Return `(url, token)` or fail with a configuration error naming the
    /// missing variable. Empty strings count as missing.
    pub fn require(&self) -> StorageResult<(&str, &str)> {
        let url = non_empty(self.url.as_deref()).ok_or_else(|| StorageError::Configuration {
            message: format!("{ENV_KV_URL} is required for the remote key-value backend"),
        })?;
        let token =
            non_empty(self.token.as_deref()).ok_or_else(|| StorageError::Configuration {
                message: format!("{ENV_KV_TOKEN} is required for the remote key-value backend"),
            })?;
        Ok((url, token))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Complete storage settings
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Deployment environment; selects the backend
    pub environment: Environment,
    /// Directory for the filesystem backend
    pub data_dir: PathBuf,
    /// Remote store settings, used in production
    pub remote: RemoteConfig,
    /// Retry policy for the remote backend
    pub retry: RetryPolicy,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            remote: RemoteConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl StorageSettings {
    /// Load settings from the process environment, reading `.env` first if present
    pub fn from_env() -> Self {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let environment = lookup(ENV_APP_ENV)
            .map(|v| Environment::parse(&v))
            .unwrap_or(defaults.environment);

        let data_dir = lookup(ENV_DATA_DIR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let request_timeout = lookup(ENV_KV_TIMEOUT_MS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.remote.request_timeout);

        Self {
            environment,
            data_dir,
            remote: RemoteConfig {
                url: lookup(ENV_KV_URL),
                token: lookup(ENV_KV_TOKEN),
                request_timeout,
            },
            retry: defaults.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = StorageSettings::from_lookup(|_| None);
        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.data_dir, PathBuf::from("./data"));
        assert!(settings.remote.url.is_none());
        assert_eq!(settings.remote.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_production_with_credentials() {
        let settings = StorageSettings::from_lookup(lookup_from(&[
            ("APP_ENV", "production"),
            ("KV_REST_API_URL", "https://kv.example.com"),
            ("KV_REST_API_TOKEN", "secret"),
            ("KV_REQUEST_TIMEOUT_MS", "2500"),
        ]));
        assert!(settings.environment.is_production());
        let (url, token) = settings.remote.require().unwrap();
        assert_eq!(url, "https://kv.example.com");
        assert_eq!(token, "secret");
        assert_eq!(settings.remote.request_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_require_names_missing_variable() {
        let remote = RemoteConfig {
            url: Some("https://kv.example.com".to_string()),
            token: Some("  ".to_string()),
            ..Default::default()
        };
        let err = remote.require().unwrap_err();
        assert!(err.to_string().contains("KV_REST_API_TOKEN"));

        let err = RemoteConfig::default().require().unwrap_err();
        assert!(err.to_string().contains("KV_REST_API_URL"));
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("Production"), Environment::Production);
        assert_eq!(Environment::parse("test"), Environment::Test);
        assert_eq!(Environment::parse("staging"), Environment::Development);
    }
}
