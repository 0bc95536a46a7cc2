//! Bounded retry with exponential backoff and jitter.
//!
//! Only [`GatewayError::is_retryable`] failures are retried; validation and
//! malformed-input errors surface immediately. A rate-limit hint from the
//! backend takes precedence over the computed backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (zero-based): base doubling per
    /// attempt, capped, with up to +50% jitter. A backend hint wins outright.
    fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.min(self.max_delay);
        }
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.0..0.5);
        backoff.mul_f64(1.0 + jitter).min(self.max_delay)
    }
}

/// Run `op`, retrying transient failures within the policy's budget.
///
/// The final error (retryable or not) is wrapped with `stage` so callers see
/// where in the pipeline it originated.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    stage: &str,
    mut op: F,
) -> GatewayResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt, err.retry_after());
                tracing::debug!(
                    stage,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying: {err}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err.in_stage(stage)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy(), "upsert", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(GatewayError::Unavailable("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_surfaces_stage() {
        let calls = AtomicU32::new(0);
        let result: GatewayResult<()> = with_retry(&policy(), "search", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Unavailable("still down".into())) }
        })
        .await;
        let err = result.unwrap_err();
        // 1 initial attempt + 3 retries.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(err.to_string().contains("search:"));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_never_retried() {
        let calls = AtomicU32::new(0);
        let result: GatewayResult<()> = with_retry(&policy(), "ingest", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Validation("empty text".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            result.unwrap_err().kind(),
            crate::error::ErrorKind::Validation
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_never_retried() {
        let calls = AtomicU32::new(0);
        let result: GatewayResult<()> = with_retry(&policy(), "upsert", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Malformed("bad payload".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!result.unwrap_err().is_retryable());
    }

    #[test]
    fn test_rate_limit_hint_wins() {
        let p = policy();
        let delay = p.delay_for(0, Some(Duration::from_secs(2)));
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_capped() {
        let p = policy();
        let delay = p.delay_for(30, None);
        assert!(delay <= p.max_delay);
    }

    #[test]
    fn test_backoff_grows() {
        let p = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
        };
        // Jitter adds at most 50%, so attempt 2 (400ms+) always exceeds
        // attempt 0's worst case (150ms).
        let first = p.delay_for(0, None);
        let third = p.delay_for(2, None);
        assert!(third > first);
    }
}
