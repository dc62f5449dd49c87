//! Streaming orchestration around a [`GenerativeService`].
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`StreamingOrchestrator`] | Opens service calls (with retry), applies per-call timeouts and progress |
//! | [`InflightRegistry`] | De-duplicates concurrent requests sharing a fingerprint |
//! | [`ProgressThrottle`] | Throttled progress estimate over delivered fragments |
//!
//! Retries cover only the request/response call and stream establishment. A
//! failure after the first fragment ends the stream with that error.

pub mod inflight;
pub mod progress;

pub use inflight::{Admission, InflightGuard, InflightOutcome, InflightRegistry, InflightWaiter};
pub use progress::{with_progress, ProgressFn, ProgressThrottle, DEFAULT_PROGRESS_EVERY};

use crate::cache::Fingerprint;
use crate::error_code::ErrorKind;
use crate::resilience::{ErrorClassification, RetryExecutor, RetryPolicy};
use crate::transport::GenerativeService;
use crate::{BoxStream, Error, Result};
use futures::{stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn timed_out() -> Error {
    Error::Classified(ErrorClassification::new(ErrorKind::Network, "request timed out"))
}

async fn with_deadline<T>(timeout: Option<Duration>, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match timeout {
        None => fut.await,
        Some(d) => tokio::time::timeout(d, fut).await.unwrap_or_else(|_| Err(timed_out())),
    }
}

/// Bounds each wait for the next fragment; a timeout ends the stream with a NETWORK error.
fn with_fragment_timeout(
    stream: BoxStream<'static, String>,
    timeout: Option<Duration>,
) -> BoxStream<'static, String> {
    let Some(limit) = timeout else {
        return stream;
    };
    Box::pin(stream::unfold(Some(stream), move |state| async move {
        let mut inner = state?;
        match tokio::time::timeout(limit, inner.next()).await {
            Ok(Some(Ok(fragment))) => Some((Ok(fragment), Some(inner))),
            Ok(Some(Err(e))) => Some((Err(e), None)),
            Ok(None) => None,
            Err(_) => Some((Err(timed_out()), None)),
        }
    }))
}

pub struct StreamingOrchestrator {
    service: Arc<dyn GenerativeService>,
    retry: RetryExecutor,
    inflight: InflightRegistry,
    timeout: Option<Duration>,
    progress_every: usize,
}

impl StreamingOrchestrator {
    pub fn new(service: Arc<dyn GenerativeService>) -> Self {
        Self {
            service,
            retry: RetryExecutor::default(),
            inflight: InflightRegistry::new(),
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryExecutor::new(policy);
        self
    }

    /// `None` disables the per-call deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    pub fn service(&self) -> &Arc<dyn GenerativeService> {
        &self.service
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.retry.policy()
    }

    /// Registers a request for `fingerprint` or joins the one already running.
    pub fn admit(&self, fingerprint: &Fingerprint) -> Admission {
        self.inflight.admit(fingerprint)
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_in_flight(&self, fingerprint: &Fingerprint) -> bool {
        self.inflight.contains(fingerprint)
    }

    /// Request/response call, retried per policy.
    pub async fn send<R>(
        &self,
        prompt: &str,
        credential: &str,
        on_retry: R,
    ) -> std::result::Result<String, ErrorClassification>
    where
        R: FnMut(u32, &ErrorClassification, Duration),
    {
        let started = tokio::time::Instant::now();
        let text = self
            .retry
            .execute_with(
                || with_deadline(self.timeout, self.service.send(prompt, credential)),
                on_retry,
            )
            .await?;
        info!(
            service = self.service.name(),
            duration_ms = started.elapsed().as_millis() as u64,
            output_length = text.len(),
            "send finished"
        );
        Ok(text)
    }

    /// Opens a fragment stream. Establishment is retried per policy; the returned
    /// stream is not.
    pub async fn stream<R>(
        &self,
        prompt: &str,
        credential: &str,
        on_progress: Option<ProgressFn>,
        on_retry: R,
    ) -> std::result::Result<BoxStream<'static, String>, ErrorClassification>
    where
        R: FnMut(u32, &ErrorClassification, Duration),
    {
        let opened = self
            .retry
            .execute_with(
                || with_deadline(self.timeout, self.service.stream(prompt, credential)),
                on_retry,
            )
            .await?;
        info!(service = self.service.name(), "stream opened");

        let timed = with_fragment_timeout(opened, self.timeout);
        Ok(match on_progress {
            Some(cb) => with_progress(timed, self.progress_every, cb),
            None => {
                debug!("stream opened without progress callback");
                timed
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        error: &'static str,
        fragments: Vec<&'static str>,
    }

    #[async_trait]
    impl GenerativeService for Flaky {
        async fn send(&self, _prompt: &str, _credential: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(Error::runtime(self.error));
            }
            Ok(self.fragments.concat())
        }

        async fn stream(&self, _prompt: &str, _credential: &str) -> Result<BoxStream<'static, String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(Error::runtime(self.error));
            }
            let items: Vec<Result<String>> = self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    fn flaky(failures: u32, error: &'static str) -> Arc<Flaky> {
        Arc::new(Flaky {
            calls: AtomicU32::new(0),
            failures,
            error,
            fragments: vec!["Implement ", "a dark mode ", "toggle."],
        })
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_open_is_retried() {
        let service = flaky(2, "connection refused");
        let orch = StreamingOrchestrator::new(service.clone()).with_retry_policy(fast_policy());
        let mut retries = Vec::new();
        let s = orch
            .stream("p", "k", None, |attempt, _, delay| retries.push((attempt, delay)))
            .await
            .unwrap();
        let text: Vec<String> = s.map(|r| r.unwrap()).collect().await;
        assert_eq!(text.concat(), "Implement a dark mode toggle.");
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            retries,
            vec![(1, Duration::from_millis(10)), (2, Duration::from_millis(20))]
        );
    }

    #[tokio::test]
    async fn test_send_does_not_retry_auth() {
        let service = flaky(5, "401 Unauthorized");
        let orch = StreamingOrchestrator::new(service.clone()).with_retry_policy(fast_policy());
        let err = orch.send("p", "k", |_, _, _| {}).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    struct Stalled;

    #[async_trait]
    impl GenerativeService for Stalled {
        async fn send(&self, _prompt: &str, _credential: &str) -> Result<String> {
            futures::future::pending().await
        }

        async fn stream(&self, _prompt: &str, _credential: &str) -> Result<BoxStream<'static, String>> {
            let first = stream::iter(vec![Ok("partial".to_string())]);
            Ok(Box::pin(first.chain(stream::pending())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_fragment_times_out_as_network() {
        let orch = StreamingOrchestrator::new(Arc::new(Stalled))
            .with_retry_policy(RetryPolicy::new().with_max_attempts(1))
            .with_timeout(Some(Duration::from_secs(5)));
        let items: Vec<Result<String>> = orch
            .stream("p", "k", None, |_, _, _| {})
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.classification().unwrap().kind, ErrorKind::Network);

        let err = orch.send("p", "k", |_, _, _| {}).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.message, "request timed out");
    }

    #[tokio::test]
    async fn test_progress_is_throttled() {
        let service = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            failures: 0,
            error: "",
            fragments: vec!["ab"; 7],
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let orch = StreamingOrchestrator::new(service).with_progress_every(3);
        let cb: ProgressFn = Arc::new(move |c| sink.lock().unwrap().push(c));
        let n = orch
            .stream("p", "k", Some(cb), |_, _, _| {})
            .await
            .unwrap()
            .count()
            .await;
        assert_eq!(n, 7);
        assert_eq!(*seen.lock().unwrap(), vec![6, 12]);
    }

    #[test]
    fn test_admission_tracks_in_flight() {
        let orch = StreamingOrchestrator::new(flaky(0, ""));
        let fp = crate::cache::fingerprint("x", "m", "{}");
        let first = orch.admit(&fp);
        assert!(matches!(first, Admission::Leader(_)));
        assert!(matches!(orch.admit(&fp), Admission::Follower(_)));
        assert_eq!(orch.in_flight(), 1);
        drop(first);
        assert_eq!(orch.in_flight(), 0);
        assert!(!orch.is_in_flight(&fp));
    }
}
