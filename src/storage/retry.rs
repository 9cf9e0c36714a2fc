//! Retry with exponential backoff and failure classification
//!
//! Classification works on error text so that every client (HTTP, Redis, test
//! doubles) is judged by the same rules. Two pure functions carry the policy:
//! [`is_retryable`] decides whether a failure is transient, and
//! [`classify_message`] maps it to an [`ErrorCategory`]. Both are shared by the
//! read and write paths.

use crate::error::{ErrorCategory, StorageError};
use crate::storage::constants::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Markers of transient failures, matched against lowercased error text
pub const TRANSIENT_MARKERS: &[&str] = &[
    // connection refused
    "econnrefused",
    "connection refused",
    // dns resolution
    "enotfound",
    "dns error",
    "failed to lookup address",
    "name or service not known",
    // timeout
    "etimedout",
    "timeout",
    "timed out",
    // connection reset
    "econnreset",
    "connection reset",
    // broken pipe
    "epipe",
    "broken pipe",
    "socket hang up",
    "network",
    // temporary failure
    "eai_again",
    "temporary failure",
    "service unavailable",
    // rate limiting
    "rate limit",
    "too many requests",
];

const TIMEOUT_MARKERS: &[&str] = &["etimedout", "timeout", "timed out"];

const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "unauthorised",
    "forbidden",
    "authentication",
    "invalid token",
    "wrongpass",
    "noauth",
];

const OOM_MARKERS: &[&str] = &["oom command", "out of memory", "maxmemory"];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

/// Whether a failure described by `message` is worth retrying
pub fn is_retryable(message: &str) -> bool {
    contains_any(&message.to_lowercase(), TRANSIENT_MARKERS)
}

/// Category of a failure described by `message`
pub fn classify_message(message: &str) -> ErrorCategory {
    let text = message.to_lowercase();
    if contains_any(&text, TIMEOUT_MARKERS) {
        ErrorCategory::Timeout
    } else if contains_any(&text, TRANSIENT_MARKERS) {
        ErrorCategory::Connectivity
    } else if contains_any(&text, AUTH_MARKERS) {
        ErrorCategory::Authentication
    } else if contains_any(&text, OOM_MARKERS) {
        ErrorCategory::OutOfMemory
    } else if text.contains("permission denied") {
        ErrorCategory::Permission
    } else if text.contains("read-only file system") {
        ErrorCategory::ReadOnlyFilesystem
    } else if text.contains("no space left") {
        ErrorCategory::OutOfSpace
    } else {
        ErrorCategory::Generic
    }
}

/// Backoff policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Growth factor per retry
    pub multiplier: u32,
    /// Upper bound of any single delay
    pub max_delay: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            multiplier: 2,
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based): `min(base * multiplier^attempt, max)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = (self.multiplier as u64).saturating_pow(attempt);
        Duration::from_millis(base_ms.saturating_mul(factor)).min(self.max_delay)
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// State following a failed attempt
    pub fn after_failure(&self, attempt: u32, retryable: bool) -> AttemptState {
        if retryable && attempt < self.max_retries {
            AttemptState::RetryWait {
                attempt,
                delay: self.backoff_delay(attempt),
            }
        } else {
            AttemptState::Failed {
                attempts: attempt + 1,
            }
        }
    }
}

/// Per-invocation state of [`execute_with_retry`]
///
/// `Idle → Attempting → {success | RetryWait → Attempting | Failed}`. Success
/// returns the value directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Not started
    Idle,
    /// Running attempt `attempt` (0-based)
    Attempting { attempt: u32 },
    /// Sleeping after failed attempt `attempt`
    RetryWait { attempt: u32, delay: Duration },
    /// Gave up after `attempts` attempts
    Failed { attempts: u32 },
}

/// Record of one failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 0-based attempt index
    pub attempt: u32,
    /// Backoff before the next attempt, if one follows
    pub delay: Option<Duration>,
    /// Classification of the failure
    pub retryable: bool,
}

/// Final failure of a retried operation
#[derive(Debug, Clone)]
pub struct RetryFailure {
    /// Operation name, e.g. `set`
    pub operation: String,
    /// Key the operation targeted
    pub key: String,
    /// Attempts made
    pub attempts: Vec<RetryAttempt>,
    /// Text of the last error
    pub message: String,
    /// Category of the last error
    pub category: ErrorCategory,
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' failed after {} attempt(s): {}",
            self.operation,
            self.key,
            self.attempts.len(),
            self.message
        )
    }
}

impl From<RetryFailure> for StorageError {
    fn from(failure: RetryFailure) -> Self {
        let reason = format!(
            "{} (after {} attempt(s))",
            failure.message,
            failure.attempts.len()
        );
        StorageError::classified(failure.category, &failure.operation, &failure.key, reason)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's retries are used up.
pub async fn execute_with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation: &str,
    key: &str,
    mut op: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempts: Vec<RetryAttempt> = Vec::new();
    let mut last_message = String::new();
    let mut state = AttemptState::Idle;

    loop {
        state = match state {
            AttemptState::Idle => AttemptState::Attempting { attempt: 0 },
            AttemptState::Attempting { attempt } => match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, key, attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    last_message = err.to_string();
                    let retryable = is_retryable(&last_message);
                    let next = policy.after_failure(attempt, retryable);
                    let delay = match next {
                        AttemptState::RetryWait { delay, .. } => Some(delay),
                        _ => None,
                    };
                    attempts.push(RetryAttempt {
                        attempt,
                        delay,
                        retryable,
                    });
                    if let Some(delay) = delay {
                        warn!(
                            operation,
                            key,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %last_message,
                            "transient storage failure, retrying"
                        );
                    }
                    next
                }
            },
            AttemptState::RetryWait { attempt, delay } => {
                tokio::time::sleep(delay).await;
                AttemptState::Attempting {
                    attempt: attempt + 1,
                }
            }
            AttemptState::Failed { attempts: count } => {
                debug!(operation, key, attempts = count, "giving up");
                return Err(RetryFailure {
                    operation: operation.to_string(),
                    key: key.to_string(),
                    category: classify_message(&last_message),
                    message: last_message,
                    attempts,
                });
            }
        };
    }
}
