//! Bounded retry for transient read errors.
//!
//! Applied to `metadata`/`get_object`/`list` only. Presigning is local
//! computation and never retried: a failure there indicates a
//! configuration error, not transience.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::StorageResult;

/// Retry parameters for transient storage read errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay, doubled per attempt.
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_jitter: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Create a policy from the env, falling back to defaults.
    pub fn from_env() -> Self {
        let max_attempts = std::env::var("STORAGE_RETRY_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3)
            .max(1);
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Backoff delay before retrying after `attempt` (0-based) failures.
    fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay.saturating_mul(1 << attempt.min(16));
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        backoff + jitter
    }
}

/// Run `f`, retrying on transient errors up to the policy's attempt budget.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: &str, f: F) -> StorageResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    op = op,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient storage error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = with_retry(&policy, "head_object", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StorageError::transient("connection reset"))
            } else {
                Ok(42u64)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: StorageResult<()> = with_retry(&policy, "get_object", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::transient("timeout"))
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: StorageResult<()> = with_retry(&policy, "head_object", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::not_found("a/b.mp3"))
        })
        .await;

        assert!(matches!(result.unwrap_err(), StorageError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
