//! Shared retry-with-exponential-backoff, used identically by every
//! LLM-backed pipeline stage. Retries only errors the classifier accepts
//! (`CoreError::is_retryable`); usage and state errors short-circuit.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::CoreError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before re-attempt number `attempt` (1-based): base doubling
    /// each time — 500ms, 1s, 2s with the default policy.
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (1 << (attempt - 1))
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping between attempts.
/// Non-retryable errors are returned immediately. The retry loop is
/// sequential — no attempt starts while another is in flight.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut last_error: Option<CoreError> = None;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            let delay = policy.delay_for(attempt - 1);
            warn!(
                "{label}: attempt {}/{} failed, retrying after {}ms",
                attempt - 1,
                policy.max_attempts,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => last_error = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        CoreError::Provider(format!("{label}: exhausted {} attempts", policy.max_attempts))
    }))
}
