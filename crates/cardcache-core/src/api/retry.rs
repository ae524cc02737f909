//! Bounded retry with exponential backoff.
//!
//! Both outbound call sites (candidate queries and image downloads) go
//! through [`with_retry`], so they share one attempt ceiling and one
//! backoff curve.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ApiError;

/// Default number of attempts (the first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff delay in milliseconds.
/// 1 second is polite to the server while not stalling a batch too long.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Errors that can be classified as transient.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based):
    /// `base_delay * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        if self.jitter {
            add_jitter(delay)
        } else {
            delay
        }
    }
}

/// Stretch a delay by a random factor in `[1.0, 1.5]`.
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=1.5);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Sleep for `duration` unless `cancel` fires first. Returns `true` when
/// the sleep was cut short by cancellation.
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt ceiling is reached. The last error is returned unchanged.
///
/// Each attempt and each backoff sleep is raced against `cancel`; a
/// cancelled token yields [`ApiError::Cancelled`].
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut operation: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            result = operation() => result,
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(what, attempts = attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    what,
                    error = %e,
                    attempt,
                    max_attempts,
                    backoff_ms = delay.as_millis() as u64,
                    "Request failed, backing off"
                );
                if sleep_or_cancel(cancel, delay).await {
                    return Err(ApiError::Cancelled);
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
