//! Exponential backoff with jitter (§4.6), generalized from the teacher's
//! `SessionConfig` backoff parameters in `scrapers::binance_session`
//! (`backoff_base_ms`/`backoff_multiplier`/`jitter_factor`/`backoff_max_ms`)
//! into a standalone retry policy usable by any provider call.

use crate::config::RetryConfig;
use crate::error::ProviderError;
use rand::Rng;
use std::time::Duration;

pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let jitter_span = base * config.jitter_factor;
    let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
    let delay_ms = (base + jitter).max(0.0).min(config.max_delay_ms as f64);
    Duration::from_millis(delay_ms as u64)
}

/// Runs `f` under the retry policy: non-retryable errors fail immediately,
/// retryable ones (5xx, 429, network, timeout) retry up to `max_attempts`
/// with exponential backoff.
pub async fn retry_with_backoff<T, F, Fut>(config: &RetryConfig, mut f: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() || attempt + 1 >= config.max_attempts => return Err(e),
            Err(_) => {
                tokio::time::sleep(backoff_delay(config, attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_retryable_errors_up_to_max_attempts() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), ProviderError> = retry_with_backoff(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Timeout) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), ProviderError> = retry_with_backoff(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Http {
                    status: 404,
                    message: "not found".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        };
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProviderError::Timeout)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
