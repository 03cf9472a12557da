//! Bounded exponential backoff for external fetches.
//!
//! Delay for attempt `n` is `initial * multiplier^n`, capped at the
//! configured maximum, with ± jitter to avoid thundering herds. Only
//! external-system errors are retried; every other error class is
//! returned to the caller immediately.

use std::time::Duration;

use opensettle_types::{ErrorKind, Result, RetryConfig, SettleError};

/// Executes fallible async operations under a bounded retry schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay before retry attempt `attempt` (0-based).
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.config.max_delay_ms as f64);
        let jitter_range = capped * self.config.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * jitter_range * 2.0;
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    /// Run `operation`, retrying external-system errors up to the
    /// configured attempt count.
    ///
    /// # Errors
    /// - The operation's own error, when it is not external-class.
    /// - `OS_ERR_501` when every attempt failed externally.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.max_attempts.max(1);
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.delay_for(attempt - 1);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max = attempts,
                    delay = ?delay,
                    "Retrying external fetch"
                );
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            operation = operation_name,
                            attempt,
                            "External fetch recovered"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.kind() == ErrorKind::External => {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "External fetch failed"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Err(SettleError::ExternalUnavailable { attempts })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn first_success_needs_no_retry() {
        let policy = RetryPolicy::new(fast_config(3));
        let calls = AtomicU32::new(0);
        let result = policy
            .run("fetch", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_within_budget() {
        let policy = RetryPolicy::new(fast_config(3));
        let calls = AtomicU32::new(0);
        let result = policy
            .run("fetch", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SettleError::ExternalSystem {
                            reason: "down".to_string(),
                        })
                    } else {
                        Ok("up")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "up");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_yields_unavailable() {
        let policy = RetryPolicy::new(fast_config(2));
        let err = policy
            .run("fetch", || async {
                Err::<(), _>(SettleError::ExternalSystem {
                    reason: "down".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SettleError::ExternalUnavailable { attempts: 2 }
        ));
    }

    #[tokio::test]
    async fn non_external_errors_are_not_retried() {
        let policy = RetryPolicy::new(fast_config(5));
        let calls = AtomicU32::new(0);
        let err = policy
            .run("fetch", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(SettleError::Internal("bug".to_string())) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SettleError::Internal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 350,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        });
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        // 400 would exceed the cap.
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
    }
}
