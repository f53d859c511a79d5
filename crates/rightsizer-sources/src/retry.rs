//! Retry with configurable backoff for remote fetches.
//!
//! Only the recommendation feed retries (its failure aborts the whole run,
//! so it gets a bounded second chance); the tag and price services degrade
//! per record instead.

use std::time::Duration;

/// Backoff policy controlling the delay between retry attempts.
#[derive(Debug, Clone)]
pub enum BackoffPolicy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff: base * 2^attempt, capped at max.
    Exponential { base: Duration, max: Duration },
    /// No delay between retries.
    None,
}

impl BackoffPolicy {
    /// Compute the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            BackoffPolicy::Fixed(d) => *d,
            BackoffPolicy::Exponential { base, max } => {
                let millis = base.as_millis() as u64 * 2u64.saturating_pow(attempt as u32);
                Duration::from_millis(millis).min(*max)
            }
            BackoffPolicy::None => Duration::ZERO,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

/// Execute a remote fetch with retry logic.
///
/// The closure `f` is called up to `max_retries + 1` times. Retries occur
/// only when the error satisfies
/// [`rightsizer_types::RightsizerError::is_retryable`]; other errors return
/// immediately. Between retries, the function sleeps for the duration
/// dictated by `policy`.
pub async fn fetch_with_retry<T, F, Fut>(
    f: F,
    max_retries: usize,
    policy: &BackoffPolicy,
    what: &str,
) -> rightsizer_types::Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = rightsizer_types::Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..=max_retries {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(target = %what, attempt, delay_ms = %delay.as_millis(), error = %e, "Retryable fetch error, retrying");
                last_err = Some(e);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err
        .unwrap_or_else(|| rightsizer_types::RightsizerError::Other(format!("{what}: retry loop ended without a result"))))
}
