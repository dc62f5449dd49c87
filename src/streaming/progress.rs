//! Throttled progress reporting over a fragment stream.

use crate::BoxStream;
use futures::StreamExt;
use std::sync::Arc;

/// Receives the number of characters delivered so far.
pub type ProgressFn = Arc<dyn Fn(usize) + Send + Sync>;

pub const DEFAULT_PROGRESS_EVERY: usize = 5;

/// Counts fragments and characters; reports on every `every`-th fragment.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    every: usize,
    fragments: usize,
    chars: usize,
}

impl ProgressThrottle {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            fragments: 0,
            chars: 0,
        }
    }

    /// Records one fragment; returns the running character count when a report is due.
    pub fn record(&mut self, fragment: &str) -> Option<usize> {
        self.fragments += 1;
        self.chars += fragment.chars().count();
        if self.fragments % self.every == 0 {
            Some(self.chars)
        } else {
            None
        }
    }

    pub fn chars(&self) -> usize {
        self.chars
    }
}

/// Wraps `stream` so `on_progress` fires every `every` fragments. Items pass through unchanged.
pub fn with_progress(
    stream: BoxStream<'static, String>,
    every: usize,
    on_progress: ProgressFn,
) -> BoxStream<'static, String> {
    let mut throttle = ProgressThrottle::new(every);
    Box::pin(stream.inspect(move |item| {
        if let Ok(fragment) = item {
            if let Some(chars) = throttle.record(fragment) {
                on_progress(chars);
            }
        }
    }))
}
