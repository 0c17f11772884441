use std::time::Duration;
use std::future::Future;

use super::classification::ErrorClassification;
use super::types::ImpactError;
use tracing::warn;

const MAX_DELAY: Duration = Duration::from_secs(30);

impl ErrorClassification {
    /// Calculate the retry delay for this error classification based on the
    /// current attempt number (0-indexed).
    ///
    /// - RateLimitError: 5 * base + (attempt * 5 * base), capped at 30s
    /// - Default: exponential backoff base * 2^attempt + random jitter (0-base), capped at 30s
    pub fn retry_delay(&self, attempt: u32, base: Duration) -> Duration {
        let base_secs = base.as_secs_f64();
        let secs = match self.error_type {
            "RateLimitError" => base_secs * 5.0 * (1 + attempt) as f64,
            _ => {
                let backoff = base_secs * 2.0_f64.powi(attempt as i32);
                let jitter = rand::random::<f64>() * base_secs;
                backoff + jitter
            }
        };
        Duration::from_secs_f64(secs).min(MAX_DELAY)
    }
}

/// Retry configuration for one-shot backend requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Execute an async request with retry logic.
///
/// Retries only if the error is classified as retryable and we haven't
/// exceeded max_retries. Streaming runs never go through here.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut factory: F,
) -> Result<T, ImpactError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ImpactError>>,
{
    let max_attempts = config.max_retries + 1;
    let mut last_error = None;

    for attempt in 0..max_attempts {
        match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let classification = e.classify();

                if !classification.retryable || attempt + 1 >= max_attempts {
                    if !classification.retryable {
                        warn!(
                            operation = operation_name,
                            error_type = classification.error_type,
                            "Non-retryable error, failing immediately"
                        );
                    } else {
                        warn!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            max = max_attempts,
                            "Max retries exhausted"
                        );
                    }
                    return Err(e);
                }

                let delay = classification.retry_delay(attempt, config.base_delay);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max = max_attempts,
                    error_type = classification.error_type,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after error"
                );

                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ImpactError::Internal("Retry loop exited unexpectedly".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig { max_retries: 3, base_delay: Duration::from_millis(1) }
    }

    #[test]
    fn test_retry_delay_rate_limit() {
        let class = ErrorClassification { error_type: "RateLimitError", retryable: true };
        let base = Duration::from_secs(1);
        assert_eq!(class.retry_delay(0, base), Duration::from_secs(5));
        assert_eq!(class.retry_delay(1, base), Duration::from_secs(10));
        assert_eq!(class.retry_delay(9, base), Duration::from_secs(30)); // capped
    }

    #[test]
    fn test_retry_delay_default_exponential() {
        let class = ErrorClassification { error_type: "NetworkError", retryable: true };
        let base = Duration::from_secs(1);
        let d0 = class.retry_delay(0, base);
        let d1 = class.retry_delay(1, base);
        assert!(d0.as_secs_f64() >= 1.0 && d0.as_secs_f64() < 2.0);
        assert!(d1.as_secs_f64() >= 2.0 && d1.as_secs_f64() < 3.0);
        assert_eq!(class.retry_delay(10, base), MAX_DELAY);
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_first_try() {
        let result = with_retry("test", &fast(), || async {
            Ok::<_, ImpactError>(42)
        }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_after_network_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry("test", &fast(), || {
            let attempts = attempts_clone.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ImpactError::Network("reset".into()))
                } else {
                    Ok("ok")
                }
            }
        }).await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_fails_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry("test", &fast(), || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ImpactError::Api { status: 404, message: "missing".into() })
            }
        }).await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry("test", &fast(), || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ImpactError::Timeout("slow".into()))
            }
        }).await;

        assert!(matches!(result, Err(ImpactError::Timeout(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
