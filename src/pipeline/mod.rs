//! Refinement pipeline
//!
//! Coordinates one refinement request end to end:
//!
//! 1. gather context (best effort)
//! 2. build the prompt and check it against the token budget
//! 3. fingerprint `(input, model, context digest)` and consult the cache
//! 4. on a miss, lead or join the in-flight request for that fingerprint
//! 5. stream fragments to the observer, then cache, record history and emit telemetry
//!
//! Side effects (cache write, history, telemetry) happen only once the result is
//! final. Failures and cancellations leave no trace in the cache or history.

mod builder;
mod observer;
mod outcome;
mod state;

pub use builder::RefinementPipelineBuilder;
pub use observer::{noop_observer, NoopObserver, Recorded, RecordingObserver, RefineObserver};
pub use outcome::{RefineOutcome, Refinement};
pub use state::RefineState;

use crate::cache::{Fingerprint, FingerprintGenerator, RequestCache};
use crate::config::RefineConfig;
use crate::context::{ContextProvider, GatheredContext};
use crate::error_code::ErrorKind;
use crate::prompt::PromptBuilder;
use crate::resilience::{ErrorClassification, ErrorClassifier};
use crate::secrets::SecretStore;
use crate::streaming::{Admission, InflightGuard, InflightOutcome, ProgressFn, StreamingOrchestrator};
use crate::telemetry::{events, HistorySink, RefinementRecord, TelemetryEvent};
use crate::tokens::TokenBudget;
use crate::transport::GenerativeService;
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

type Outcome = std::result::Result<RefineOutcome, ErrorClassification>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Stream,
    Once,
}

/// Emits state transitions to the observer and the trace log.
struct StateTracker {
    observer: Arc<dyn RefineObserver>,
    current: RefineState,
}

impl StateTracker {
    fn start(observer: Arc<dyn RefineObserver>) -> Self {
        observer.on_state(RefineState::Received);
        Self {
            observer,
            current: RefineState::Received,
        }
    }

    fn enter(&mut self, next: RefineState) {
        if self.current == next {
            return;
        }
        trace!(from = %self.current, to = %next, "refine state");
        self.current = next;
        self.observer.on_state(next);
    }

    fn fail(&mut self, classification: ErrorClassification) -> Outcome {
        debug!(kind = classification.kind.name(), message = %classification.message, "refinement failed");
        self.enter(RefineState::Failed);
        Err(classification)
    }

    fn cancel(&mut self) -> Outcome {
        debug!("refinement cancelled");
        self.enter(RefineState::Cancelled);
        Ok(RefineOutcome::Cancelled)
    }
}

/// Per-request values shared by the leader and follower paths.
struct Prepared<'a> {
    input: &'a str,
    prompt: String,
    context: GatheredContext,
    fingerprint: Fingerprint,
    warning: Option<String>,
    estimated_tokens: usize,
    started: Instant,
}

impl Prepared<'_> {
    fn finish(&self, text: String, from_cache: bool, deduplicated: bool) -> Outcome {
        Ok(RefineOutcome::Completed(Refinement {
            text,
            fingerprint: self.fingerprint.clone(),
            from_cache,
            deduplicated,
            warning: self.warning.clone(),
            estimated_tokens: self.estimated_tokens,
            elapsed: self.started.elapsed(),
        }))
    }
}

pub struct RefinementPipeline {
    config: RefineConfig,
    model_id: String,
    cache: Arc<RequestCache>,
    orchestrator: StreamingOrchestrator,
    context: Arc<dyn ContextProvider>,
    secrets: Arc<dyn SecretStore>,
    sink: Arc<dyn HistorySink>,
    prompt: PromptBuilder,
    budget: TokenBudget,
    fingerprints: FingerprintGenerator,
}

impl RefinementPipeline {
    pub fn builder(service: Arc<dyn GenerativeService>) -> RefinementPipelineBuilder {
        RefinementPipelineBuilder::new(service)
    }

    pub fn config(&self) -> &RefineConfig {
        &self.config
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    pub fn orchestrator(&self) -> &StreamingOrchestrator {
        &self.orchestrator
    }

    /// Clears cached results and counters. In-flight requests are unaffected.
    pub fn reset(&self) {
        self.cache.reset();
    }

    /// Fingerprint the pipeline would use for `input` under the current context.
    pub async fn fingerprint_for(&self, input: &str) -> Fingerprint {
        let context = GatheredContext::gather(self.context.as_ref()).await;
        self.fingerprints.generate(input, &self.model_id, &context.digest())
    }

    /// Refines `input`, streaming fragments to `observer` as they arrive.
    pub async fn refine(
        &self,
        input: &str,
        observer: Arc<dyn RefineObserver>,
        cancel: &CancellationToken,
    ) -> Outcome {
        self.run(input, observer, cancel, Delivery::Stream).await
    }

    /// Same pipeline over the request/response call; the full text arrives as one fragment.
    pub async fn refine_once(
        &self,
        input: &str,
        observer: Arc<dyn RefineObserver>,
        cancel: &CancellationToken,
    ) -> Outcome {
        self.run(input, observer, cancel, Delivery::Once).await
    }

    async fn run(
        &self,
        input: &str,
        observer: Arc<dyn RefineObserver>,
        cancel: &CancellationToken,
        delivery: Delivery,
    ) -> Outcome {
        let started = Instant::now();
        let mut tracker = StateTracker::start(observer.clone());

        if input.trim().is_empty() {
            return tracker.fail(ErrorClassification::new(
                ErrorKind::InvalidInput,
                "Request is empty",
            ));
        }
        if cancel.is_cancelled() {
            return tracker.cancel();
        }

        let context = GatheredContext::gather(self.context.as_ref()).await;
        tracker.enter(RefineState::ContextGathered);

        let prompt = self.prompt.build(input, &context);
        let budget = self.budget.validate(&prompt);
        if !budget.is_valid {
            let message = budget
                .error
                .unwrap_or_else(|| "Prompt exceeds the token budget".to_string());
            return tracker.fail(ErrorClassification::new(ErrorKind::TokenOverflow, message));
        }
        if let Some(warning) = &budget.warning {
            observer.on_warning(warning);
        }
        tracker.enter(RefineState::TokenChecked);

        let fingerprint = self.fingerprints.generate(input, &self.model_id, &context.digest());
        let prepared = Prepared {
            input,
            prompt,
            context,
            fingerprint,
            warning: budget.warning,
            estimated_tokens: budget.estimated_tokens,
            started,
        };

        let mut first_lookup = true;
        loop {
            // only the first lookup of a request counts toward hit/miss stats
            let cached = if first_lookup {
                self.cache.get(&prepared.fingerprint)
            } else {
                self.cache.peek(&prepared.fingerprint)
            };
            first_lookup = false;
            if let Some(text) = cached {
                return self.serve_cached(&prepared, text, &mut tracker).await;
            }
            if tracker.current == RefineState::TokenChecked {
                tracker.enter(RefineState::CacheMiss);
            }

            match self.orchestrator.admit(&prepared.fingerprint) {
                Admission::Leader(guard) => {
                    // a previous leader may have finished between the lookup and admission
                    if self.cache.has(&prepared.fingerprint) {
                        drop(guard);
                        continue;
                    }
                    return self
                        .lead(&prepared, guard, observer, cancel, delivery, &mut tracker)
                        .await;
                }
                Admission::Follower(waiter) => {
                    debug!(fingerprint = %prepared.fingerprint, "awaiting in-flight request");
                    tracker.enter(RefineState::Streaming);
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return tracker.cancel(),
                        outcome = waiter.wait() => outcome,
                    };
                    match outcome {
                        InflightOutcome::Completed(text) => {
                            observer.on_fragment(&text);
                            self.emit(
                                TelemetryEvent::new(events::DEDUPLICATED).with_data(json!({
                                    "fingerprint": prepared.fingerprint,
                                    "input_length": prepared.input.chars().count(),
                                })),
                            )
                            .await;
                            tracker.enter(RefineState::Completed);
                            return prepared.finish(text, false, true);
                        }
                        InflightOutcome::Failed(classification) => return tracker.fail(classification),
                        InflightOutcome::Abandoned => {
                            debug!(fingerprint = %prepared.fingerprint, "in-flight leader abandoned; re-admitting");
                            if cancel.is_cancelled() {
                                return tracker.cancel();
                            }
                        }
                    }
                }
            }
        }
    }

    async fn serve_cached(
        &self,
        prepared: &Prepared<'_>,
        text: String,
        tracker: &mut StateTracker,
    ) -> Outcome {
        info!(fingerprint = %prepared.fingerprint, model = %self.model_id, "cache hit");
        self.emit(TelemetryEvent::new(events::CACHE_HIT).with_data(json!({
            "fingerprint": prepared.fingerprint,
            "input_length": prepared.input.chars().count(),
        })))
        .await;
        tracker.observer.on_fragment(&text);
        // a follower whose leader was abandoned can land here after Streaming
        let terminal = if tracker.current == RefineState::TokenChecked {
            RefineState::CacheHit
        } else {
            RefineState::Completed
        };
        tracker.enter(terminal);
        prepared.finish(text, true, false)
    }

    async fn lead(
        &self,
        prepared: &Prepared<'_>,
        guard: InflightGuard,
        observer: Arc<dyn RefineObserver>,
        cancel: &CancellationToken,
        delivery: Delivery,
        tracker: &mut StateTracker,
    ) -> Outcome {
        let Some(credential) = self.secrets.get() else {
            let c = ErrorClassification::new(ErrorKind::Auth, "No API credential configured");
            guard.fail(c.clone());
            return tracker.fail(c);
        };
        if cancel.is_cancelled() {
            return tracker.cancel();
        }

        tracker.enter(RefineState::Streaming);
        info!(fingerprint = %prepared.fingerprint, model = %self.model_id, "requesting refinement");

        let retry_observer = observer.clone();
        let on_retry = move |attempt, c: &ErrorClassification, delay| {
            retry_observer.on_retry(attempt, c, delay)
        };

        let collected = match delivery {
            Delivery::Once => {
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return tracker.cancel(),
                    sent = self.orchestrator.send(&prepared.prompt, &credential, on_retry) => sent,
                };
                sent.map(|text| {
                    if !text.is_empty() {
                        observer.on_fragment(&text);
                    }
                    text
                })
            }
            Delivery::Stream => {
                let progress_observer = observer.clone();
                let on_progress: ProgressFn = Arc::new(move |chars| progress_observer.on_progress(chars));
                let opened = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return tracker.cancel(),
                    opened = self.orchestrator.stream(&prepared.prompt, &credential, Some(on_progress), on_retry) => opened,
                };
                match opened {
                    Err(c) => Err(c),
                    Ok(mut fragments) => {
                        let mut text = String::new();
                        loop {
                            let next = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => return tracker.cancel(),
                                next = fragments.next() => next,
                            };
                            match next {
                                Some(Ok(fragment)) => {
                                    observer.on_fragment(&fragment);
                                    text.push_str(&fragment);
                                }
                                Some(Err(e)) => break Err(ErrorClassifier::new().classify(&e)),
                                None => break Ok(text),
                            }
                        }
                    }
                }
            }
        };

        let text = match collected {
            Ok(text) => text,
            Err(c) => {
                guard.fail(c.clone());
                return tracker.fail(c);
            }
        };

        if !text.is_empty() {
            self.cache.set(
                prepared.fingerprint.clone(),
                text.clone(),
                self.model_id.clone(),
                prepared.input.chars().count(),
            );
        }
        guard.complete(text.clone());
        tracker.enter(RefineState::Completed);

        let elapsed = prepared.started.elapsed();
        info!(
            fingerprint = %prepared.fingerprint,
            model = %self.model_id,
            duration_ms = elapsed.as_millis() as u64,
            output_length = text.chars().count(),
            "refinement completed"
        );
        if !text.is_empty() {
            self.record_completion(prepared, &text, elapsed).await;
        }
        prepared.finish(text, false, false)
    }

    async fn record_completion(&self, prepared: &Prepared<'_>, text: &str, elapsed: std::time::Duration) {
        let record = RefinementRecord::new(prepared.input, text, self.model_id.clone())
            .with_framework(prepared.context.framework().map(str::to_string));
        if let Err(e) = self.sink.record_refinement(record).await {
            warn!(error = %e, "history sink failed to record refinement");
        }
        self.emit(TelemetryEvent::new(events::COMPLETED).with_data(json!({
            "fingerprint": prepared.fingerprint,
            "model": self.model_id,
            "duration_ms": elapsed.as_millis() as u64,
            "input_length": prepared.input.chars().count(),
            "output_length": text.chars().count(),
        })))
        .await;
    }

    async fn emit(&self, event: TelemetryEvent) {
        let name = event.name.clone();
        if let Err(e) = self.sink.record_event(event).await {
            warn!(event = %name, error = %e, "history sink failed to record event");
        }
    }
}
