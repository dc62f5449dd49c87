use super::RefineState;
use crate::resilience::ErrorClassification;
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

/// Callback hooks for one refinement call. All methods default to no-ops.
///
/// Hooks run inline on the pipeline task; keep them short.
pub trait RefineObserver: Send + Sync {
    fn on_state(&self, _state: RefineState) {}

    /// A whole fragment, in service order.
    fn on_fragment(&self, _fragment: &str) {}

    /// Throttled estimate of characters delivered so far.
    fn on_progress(&self, _chars_so_far: usize) {}

    /// Token budget nearing its ceiling.
    fn on_warning(&self, _warning: &str) {}

    fn on_retry(&self, _attempt: u32, _classification: &ErrorClassification, _delay: Duration) {}
}

pub struct NoopObserver;

impl RefineObserver for NoopObserver {}

pub fn noop_observer() -> Arc<dyn RefineObserver> {
    Arc::new(NoopObserver)
}

/// Records every callback. Useful for tests and for hosts that render after the fact.
#[derive(Default)]
pub struct RecordingObserver {
    inner: Mutex<Recorded>,
}

#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub states: Vec<RefineState>,
    pub fragments: Vec<String>,
    pub progress: Vec<usize>,
    pub warnings: Vec<String>,
    pub retries: Vec<(u32, Duration)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Recorded {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn with<F: FnOnce(&mut Recorded)>(&self, f: F) {
        f(&mut self.inner.lock().unwrap_or_else(|p| p.into_inner()));
    }
}

impl RefineObserver for RecordingObserver {
    fn on_state(&self, state: RefineState) {
        self.with(|r| r.states.push(state));
    }
    fn on_fragment(&self, fragment: &str) {
        self.with(|r| r.fragments.push(fragment.to_string()));
    }
    fn on_progress(&self, chars_so_far: usize) {
        self.with(|r| r.progress.push(chars_so_far));
    }
    fn on_warning(&self, warning: &str) {
        self.with(|r| r.warnings.push(warning.to_string()));
    }
    fn on_retry(&self, attempt: u32, _classification: &ErrorClassification, delay: Duration) {
        self.with(|r| r.retries.push((attempt, delay)));
    }
}
