//! Retry executor
//!
//! Drives an async operation with bounded, exponential backoff. Each failure is
//! classified; non-retryable classifications short-circuit immediately.
//!
//! Retries only make sense *before* output reaches the caller. Once a stream has
//! emitted fragments, a mid-stream failure is surfaced as-is (see
//! [`crate::streaming`]).

use super::classifier::{ErrorClassification, ErrorClassifier};
use std::future::Future;
use tokio::time::Duration;
use tracing::warn;

/// Backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Upper bound on a single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay after the given failed attempt (1-indexed): `initial * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let delay = base.saturating_mul(factor);
        Duration::from_millis(delay).min(self.max_delay)
    }
}

pub struct RetryExecutor {
    policy: RetryPolicy,
    classifier: ErrorClassifier,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            classifier: ErrorClassifier::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Run `op` until it succeeds, fails non-retryably, or attempts run out.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, ErrorClassification>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = crate::Result<T>>,
    {
        self.execute_with(op, |_, _, _| {}).await
    }

    /// Like [`execute`](Self::execute), invoking `on_retry(attempt, classification, delay)`
    /// before each backoff sleep.
    pub async fn execute_with<T, F, Fut, R>(
        &self,
        mut op: F,
        mut on_retry: R,
    ) -> Result<T, ErrorClassification>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = crate::Result<T>>,
        R: FnMut(u32, &ErrorClassification, Duration),
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 1;
        loop {
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            let classification = self.classifier.classify(&err);
            if !classification.retryable || attempt >= max_attempts {
                return Err(classification);
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                kind = classification.kind.name(),
                "retrying after transient failure"
            );
            on_retry(attempt, &classification, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::ErrorKind;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350));
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(350));
        assert_eq!(p.delay_for(200), Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failures_then_success() {
        let exec = RetryExecutor::new(
            RetryPolicy::new()
                .with_max_attempts(3)
                .with_initial_delay(Duration::from_millis(10)),
        );
        let calls = Arc::new(AtomicU32::new(0));
        let mut delays = Vec::new();
        let started = tokio::time::Instant::now();

        let out = exec
            .execute_with(
                || {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 3 {
                            Err(Error::runtime("connection refused"))
                        } else {
                            Ok("done")
                        }
                    }
                },
                |attempt, c, delay| {
                    assert_eq!(c.kind, ErrorKind::Network);
                    delays.push((attempt, delay));
                },
            )
            .await;

        assert_eq!(out, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            delays,
            vec![(1, Duration::from_millis(10)), (2, Duration::from_millis(20))]
        );
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_is_not_retried() {
        let exec = RetryExecutor::new(RetryPolicy::new().with_max_attempts(5));
        let calls = Arc::new(AtomicU32::new(0));
        let mut retries = 0;

        let out: Result<(), _> = exec
            .execute_with(
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(Error::runtime("401 Unauthorized"))
                    }
                },
                |_, _, _| retries += 1,
            )
            .await;

        assert_eq!(out.unwrap_err().kind, ErrorKind::Auth);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_classification() {
        let exec = RetryExecutor::new(
            RetryPolicy::new()
                .with_max_attempts(2)
                .with_initial_delay(Duration::from_millis(1)),
        );
        let calls = Arc::new(AtomicU32::new(0));
        let out: Result<(), _> = exec
            .execute(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Err(Error::runtime("network unreachable"))
                    } else {
                        Err(Error::runtime("503 service unavailable"))
                    }
                }
            })
            .await;

        let c = out.unwrap_err();
        assert_eq!(c.kind, ErrorKind::ApiError);
        assert!(c.message.contains("503"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
