//! Bounded retry with exponential backoff and jitter

use clusterflow_cloud::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Run `operation` until it succeeds or `config.max_attempts` is used up.
///
/// Returns the last error when every attempt failed. A `max_attempts` of 0
/// is treated as a single attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            tracing::error!(
                operation = %operation_name,
                attempt,
                error = %error,
                "Operation failed after max attempts"
            );
            return Err(error);
        }

        // 0.5x - 1.5x jitter, still capped
        let base = config.delay_for_attempt(attempt - 1);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let delay = Duration::try_from_secs_f64(base.as_secs_f64() * jitter)
            .map_or(config.max_delay, |d| d.min(config.max_delay));

        tracing::warn!(
            operation = %operation_name,
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "Operation failed, retrying"
        );

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = retry_with_backoff(&config(5), "op", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err(format!("fail {n}")) } else { Ok(n) }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = retry_with_backoff(&config(4), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("always".to_string())
        })
        .await;

        assert_eq!(result, Err("always".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_runs_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _: Result<(), &str> = retry_with_backoff(&config(0), "op", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope")
        })
        .await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<(), &str> =
            retry_with_backoff(&config(3), "op", || async { Err("nope") }).await;

        // Two sleeps: >= 0.5 * (100ms + 200ms)
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
