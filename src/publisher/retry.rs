//! Bounded retry for bus writes
//!
//! Exponential backoff with jitter. A write is attempted at most
//! `max_attempts` times; the delay before retry `n` (zero-based) is
//! `base_delay * 2^n`, varied by `jitter` and capped at `max_delay`.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: usize,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of attempts (at least one)
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter factor, clamped to 0.0..=1.0
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay to wait after failed attempt `attempt` (zero-based)
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let shift = attempt.min(16) as u32;
        let exponential = self.base_delay.saturating_mul(1u32 << shift);

        let jitter_range = exponential.mul_f64(self.jitter);
        let offset = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range.as_secs_f64();
        let jittered = if offset >= 0.0 {
            exponential.saturating_add(Duration::from_secs_f64(offset))
        } else {
            exponential.saturating_sub(Duration::from_secs_f64(-offset))
        };

        jittered.min(self.max_delay)
    }
}

/// Outcome of [`retry_with_backoff`] when every attempt failed
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: usize,
    pub last_error: E,
}

/// Run `operation` until it succeeds, a non-retryable error occurs, or the
/// attempt budget is spent
///
/// `on_retry` is called with the failed attempt number (one-based) and its
/// error before each wait.
pub async fn retry_with_backoff<T, E, F, Fut, R, H>(
    config: &RetryConfig,
    is_retryable: R,
    mut on_retry: H,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    H: FnMut(usize, &E),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("Operation succeeded on attempt {}", attempt + 1);
                }
                return Ok(value);
            }
            Err(e) if attempt + 1 < max_attempts && is_retryable(&e) => {
                on_retry(attempt + 1, &e);
                let delay = config.calculate_delay(attempt);
                tracing::debug!("Waiting {:?} before retry", delay);
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(RetryExhausted {
                    attempts: attempt + 1,
                    last_error: e,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(5));
        assert_eq!(config.jitter, 0.1);
    }

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::new()
            .max_attempts(0)
            .base_delay(Duration::from_millis(50))
            .max_delay(Duration::from_secs(10))
            .jitter(1.5);

        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.base_delay, Duration::from_millis(50));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.jitter, 1.0);
    }

    #[test]
    fn test_calculate_delay_exponential() {
        let config = RetryConfig::new()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(10));

        let delay0 = config.calculate_delay(0);
        assert!(delay0 >= Duration::from_millis(90) && delay0 <= Duration::from_millis(110));

        let delay2 = config.calculate_delay(2);
        assert!(delay2 >= Duration::from_millis(360) && delay2 <= Duration::from_millis(440));

        assert_eq!(config.calculate_delay(20), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failure() {
        let config = RetryConfig::new().base_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let retries = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        let retries_clone = Arc::clone(&retries);
        let result: Result<u32, RetryExhausted<&str>> = retry_with_backoff(
            &config,
            |_| true,
            |_, _| {
                retries_clone.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("broker unavailable")
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(retries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_stops_at_max_attempts() {
        let config = RetryConfig::new()
            .max_attempts(3)
            .base_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        let result: Result<(), RetryExhausted<&str>> = retry_with_backoff(
            &config,
            |_| true,
            |_, _| {},
            move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("down")
                }
            },
        )
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error, "down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_error() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        let result: Result<(), RetryExhausted<&str>> = retry_with_backoff(
            &config,
            |_| false,
            |_, _| {},
            move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("invalid")
                }
            },
        )
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
