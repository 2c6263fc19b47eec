//! Bounded retry with fixed or linear delay.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay after every failed attempt.
    Fixed,
    /// `delay * attempt` after attempt number `attempt`.
    Linear,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
    /// Name used in log lines.
    pub label: &'static str,
}

impl RetryPolicy {
    pub fn fixed(label: &'static str, max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
            label,
        }
    }

    pub fn linear(label: &'static str, max_attempts: u32, delay: Duration) -> Self {
        Self {
            backoff: Backoff::Linear,
            ..Self::fixed(label, max_attempts, delay)
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt),
        }
    }
}

/// Why one attempt failed.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Try again if attempts remain.
    Retry(E),
    /// Stop now and return this error.
    Abort(E),
}

/// Runs `operation` until it succeeds, aborts, or the policy's attempts are
/// used up. The error of the last attempt is returned on exhaustion.
///
/// `operation` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        debug!("[{}] attempt {}/{}", policy.label, attempt, max_attempts);
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Abort(e)) => {
                warn!(
                    "[{}] attempt {}/{} failed, not retrying: {}",
                    policy.label, attempt, max_attempts, e
                );
                return Err(e);
            }
            Err(AttemptError::Retry(e)) if attempt >= max_attempts => {
                warn!("[{}] giving up after {} attempts: {}", policy.label, attempt, e);
                return Err(e);
            }
            Err(AttemptError::Retry(e)) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "[{}] attempt {}/{} failed, retrying in {:?}: {}",
                    policy.label, attempt, max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn linear_delay_scales_with_attempt() {
        let policy = RetryPolicy::linear("video", 5, Duration::from_secs(5));
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(3), Duration::from_secs(15));

        let fixed = RetryPolicy::fixed("json", 5, Duration::from_secs(1));
        assert_eq!(fixed.delay_after(4), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed("test", 5, Duration::ZERO);
        let result: Result<u32, String> = retry(&policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(AttemptError::Retry(format!("boom {attempt}")))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhaustion() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::linear("test", 4, Duration::ZERO);
        let result: Result<(), String> = retry(&policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(AttemptError::Retry(format!("boom {attempt}"))) }
        })
        .await;
        assert_eq!(result, Err("boom 4".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn abort_skips_remaining_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed("test", 5, Duration::ZERO);
        let result: Result<(), &str> = retry(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptError::Abort("unauthorized")) }
        })
        .await;
        assert_eq!(result, Err("unauthorized"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
