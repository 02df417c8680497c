//! Retrying upstream-call wrapper
//!
//! Wraps one upstream call with bounded exponential backoff. Only
//! rate-limit and server-side failures are retried; everything else, and
//! retry exhaustion, propagates the original error unmodified. All wrapped
//! calls in this system are side-effect-free reads.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::FetchError;

const MAX_BACKOFF_MS: u64 = 30_000;
const JITTER_MS: u64 = 100;

/// Retry bounds for one provider's calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts, first try included. Never zero.
    pub max_attempts: u32,
    /// Base delay doubled on every retry.
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
        }
    }

    /// `base * 2^attempt + jitter`, capped.
    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16);
        let base = self
            .base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(MAX_BACKOFF_MS);
        let jitter = rand::thread_rng().gen_range(0..=JITTER_MS);
        Duration::from_millis(base + jitter)
    }
}

impl From<&ProviderConfig> for RetryPolicy {
    fn from(cfg: &ProviderConfig) -> Self {
        Self::new(cfg.max_attempts, cfg.base_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 250)
    }
}

/// Execute `op`, retrying retry-worthy failures with exponential backoff.
///
/// The final error (exhaustion or a non-retryable failure) is returned
/// exactly as the wrapped call produced it.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt + 1 >= policy.max_attempts || !err.is_retryable() {
                    return Err(err);
                }
                let wait = policy.backoff(attempt);
                debug!(
                    provider = %err.provider(),
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Retrying upstream call after transient failure"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, 1)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(fast_policy(4), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FetchError::from_status(Provider::DexScreener, 503))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(fast_policy(4), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::from_status(Provider::GeckoTerminal, 404)) }
        })
        .await;
        assert!(matches!(
            result,
            Err(FetchError::Client { status: 404, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_propagates_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::from_status(Provider::DexScreener, 429)) }
        })
        .await;
        assert!(matches!(result, Err(FetchError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_is_bounded() {
        let policy = RetryPolicy::new(5, 250);
        let first = policy.backoff(0);
        let later = policy.backoff(40);
        assert!(first >= Duration::from_millis(250));
        assert!(later <= Duration::from_millis(MAX_BACKOFF_MS + JITTER_MS));
    }
}
