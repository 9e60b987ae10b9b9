//! Retry logic with exponential backoff
//!
//! Existence checks and view promotions are fail-open: a failed call is downgraded
//! locally. Whether those calls are retried first is explicit configuration, not an
//! implicit default: [`RetryOptions::default`] performs a single attempt.

use crate::core::error::PublishError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Options for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOptions {
    /// Maximum number of attempts (1 means no retry)
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries, in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryOptions {
    /// A single attempt, no retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }

    /// Exponential backoff with the given number of attempts
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::none()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay following `delay`, capped at [`max_delay`](Self::max_delay)
    ///
    /// A product that is negative, NaN or out of range falls back to the cap.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let max_delay = self.max_delay();
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier)
            .map_or(max_delay, |next| next.min(max_delay))
    }
}

/// Errors that know whether another attempt may succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for PublishError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Retry manager for executing operations with exponential backoff
///
/// # Examples
///
/// ```no_run
/// use artifact_publisher::core::{PublishError, RetryManager, RetryOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), PublishError> {
///     let manager = RetryManager::new(RetryOptions::attempts(3));
///
///     let exists = manager.retry(|| async {
///         // Your network call here
///         Ok::<_, PublishError>(true)
///     }).await?;
///
///     assert!(exists);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RetryManager {
    options: RetryOptions,
}

impl RetryManager {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Execute the given async operation with retry logic
    ///
    /// Non-retryable errors are returned immediately; the last error is returned once
    /// `max_attempts` is reached.
    pub async fn retry<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let max_attempts = self.options.max_attempts.max(1);
        let mut delay = self.options.initial_delay();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if attempt >= max_attempts || !error.is_retryable() {
                        return Err(error);
                    }

                    sleep(delay).await;
                    attempt += 1;

                    delay = self.options.next_delay(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryOptions {
        RetryOptions {
            max_attempts,
            initial_delay_ms: 10,
            max_delay_ms: 100,
            backoff_multiplier: 2.0,
        }
    }

    fn network_error() -> PublishError {
        PublishError::Network {
            feed: "ci".to_string(),
            message: "connection refused".to_string(),
        }
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let manager = RetryManager::new(RetryOptions::default());

        let result = manager.retry(|| async { Ok::<_, PublishError>(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_default_is_single_attempt() {
        let manager = RetryManager::new(RetryOptions::default());
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = manager
            .retry(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move { Err::<i32, _>(network_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let manager = RetryManager::new(fast(3));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = manager
            .retry(move || {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count < 2 {
                        Err(network_error())
                    } else {
                        Ok("exists")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "exists");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_max_attempts_reached() {
        let manager = RetryManager::new(fast(3));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = manager
            .retry(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move { Err::<i32, _>(network_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error() {
        let manager = RetryManager::new(fast(5));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = manager
            .retry(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err::<i32, _>(PublishError::PushFailed {
                        feed: "ci".to_string(),
                        artifact: "a".to_string(),
                        message: "HTTP 409 Conflict".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exponential_backoff() {
        let manager = RetryManager::new(RetryOptions {
            max_attempts: 3,
            initial_delay_ms: 10,
            max_delay_ms: 50,
            backoff_multiplier: 2.0,
        });

        let start = std::time::Instant::now();
        let _ = manager
            .retry(|| async { Err::<i32, _>(network_error()) })
            .await;

        // 10ms + 20ms, the last attempt does not wait
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_retry_options_deserialize() {
        let yaml = "maxAttempts: 4\ninitialDelayMs: 250\nmaxDelayMs: 2000\nbackoffMultiplier: 1.5\n";
        let options: RetryOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options.max_attempts, 4);
        assert_eq!(options.initial_delay(), Duration::from_millis(250));
        assert_eq!(options.max_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_next_delay_is_capped() {
        let options = fast(3);
        assert_eq!(options.next_delay(Duration::from_millis(10)), Duration::from_millis(20));
        assert_eq!(options.next_delay(Duration::from_millis(80)), Duration::from_millis(100));

        for multiplier in [-1.0, f64::NAN, f64::INFINITY, f64::MAX] {
            let options = RetryOptions {
                backoff_multiplier: multiplier,
                ..fast(3)
            };
            assert_eq!(
                options.next_delay(Duration::from_millis(10)),
                Duration::from_millis(100)
            );
        }
    }

    #[tokio::test]
    async fn test_negative_multiplier_from_yaml_does_not_panic() {
        let yaml = "maxAttempts: 2\ninitialDelayMs: 5\nmaxDelayMs: 20\nbackoffMultiplier: -1.0\n";
        let manager = RetryManager::new(serde_yaml::from_str(yaml).unwrap());
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = manager
            .retry(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move { Err::<i32, _>(network_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_attempts_is_at_least_one() {
        assert_eq!(RetryOptions::attempts(0).max_attempts, 1);
        assert_eq!(RetryOptions::attempts(3).max_attempts, 3);
    }
}
