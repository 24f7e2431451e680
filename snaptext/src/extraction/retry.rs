use std::future::Future;
use std::time::Duration;

use crate::error::{Result, SnapError};

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    /// Unit delay; attempt `n` waits `base_delay * 2^(n+1)` unless the
    /// upstream supplied a retry hint.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }
}

/// How a failed attempt should be handled. Derived purely from the error
/// class so the retry loop never inspects transport details itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Fail immediately; retrying cannot help (auth, quota, unknown model).
    Terminal,
    /// Retry after the upstream-provided hint, or backoff when absent.
    RetryAfter(Option<Duration>),
    /// Retry after exponential backoff.
    Backoff,
}

pub fn classify(error: &SnapError) -> Disposition {
    match error {
        SnapError::UpstreamAuth(_)
        | SnapError::UpstreamQuota(_)
        | SnapError::UpstreamNotFound(_) => Disposition::Terminal,
        SnapError::UpstreamRateLimited { retry_after } => {
            Disposition::RetryAfter(retry_after.map(Duration::from_secs))
        }
        SnapError::UpstreamServer(_)
        | SnapError::UpstreamTimeout(_)
        | SnapError::UpstreamTransport(_) => Disposition::Backoff,
        _ => Disposition::Terminal,
    }
}

/// Drive `op` until it succeeds, a terminal error surfaces, or the attempt
/// budget is exhausted. On exhaustion the last error surfaces as-is (its
/// class already distinguishes rate-limit from server-side failures).
pub async fn run<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let budget_left = attempt + 1 < policy.max_attempts;
                let delay = match classify(&error) {
                    Disposition::Terminal => return Err(error),
                    _ if !budget_left => return Err(error),
                    Disposition::RetryAfter(hint) => {
                        hint.unwrap_or_else(|| backoff_delay(policy, attempt))
                    }
                    Disposition::Backoff => backoff_delay(policy, attempt),
                };

                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Vision request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy.base_delay * 2u32.saturating_pow(attempt + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let attempts = AtomicU32::new(0);

        let result = run(&fast_policy(), |_| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SnapError::UpstreamServer("503".to_string()))
                } else {
                    Ok("extracted")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "extracted");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_error_makes_exactly_one_attempt() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = run(&fast_policy(), |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(SnapError::UpstreamAuth("invalid api key".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(SnapError::UpstreamAuth(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_quota_and_not_found_are_terminal() {
        for error in [
            SnapError::UpstreamQuota("billing hard limit".to_string()),
            SnapError::UpstreamNotFound("no such model".to_string()),
        ] {
            assert_eq!(classify(&error), Disposition::Terminal);
        }
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_after_budget_exhausted() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = run(&fast_policy(), |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(SnapError::UpstreamRateLimited {
                    retry_after: Some(0),
                })
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(SnapError::UpstreamRateLimited { .. })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_transient_error_surfaces() {
        let result: Result<()> = run(&fast_policy(), |attempt| async move {
            Err(SnapError::UpstreamServer(format!("attempt {attempt}")))
        })
        .await;

        match result {
            Err(SnapError::UpstreamServer(msg)) => assert_eq!(msg, "attempt 2"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_rate_limit_hint_becomes_delay() {
        let error = SnapError::UpstreamRateLimited {
            retry_after: Some(7),
        };
        assert_eq!(
            classify(&error),
            Disposition::RetryAfter(Some(Duration::from_secs(7)))
        );
    }
}
