//! Retry policy and a generic retry-wrapping helper for outbound calls to
//! external services (LLM, embeddings, text index, graph engine).

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential-backoff retry policy. `max_attempts` counts the first try, so
/// `max_attempts = 3` means up to 2 retries after an initial failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f32) -> Self {
        Self { max_attempts, initial_delay, backoff_multiplier }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let secs = self.initial_delay.as_secs_f64() * (self.backoff_multiplier as f64).powi(attempt as i32);
        Duration::from_secs_f64(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), 2.0)
    }
}

impl From<&crate::config::RetryConfig> for RetryPolicy {
    fn from(cfg: &crate::config::RetryConfig) -> Self {
        Self::new(cfg.max_attempts, cfg.initial_delay, cfg.backoff_multiplier)
    }
}

/// Runs `op` under `policy`, retrying with exponential backoff while
/// `is_retryable` holds for the returned error. The final attempt's error
/// (or the first non-retryable one) is returned to the caller.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                let retryable = attempt < policy.max_attempts && is_retryable(&err);
                if !retryable {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(op = op_name, attempt, %err, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 1.0);
        let calls = AtomicU32::new(0);

        let result = with_retry(
            &policy,
            "test_op",
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err::<u32, &str>("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), 1.0);
        let calls = AtomicU32::new(0);

        let result: Result<u32, &str> = with_retry(
            &policy,
            "test_op",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("always fails") }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Err("always fails"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), 1.0);
        let calls = AtomicU32::new(0);

        let result: Result<u32, &str> = with_retry(
            &policy,
            "test_op",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
            |_| false,
        )
        .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
