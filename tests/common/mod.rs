//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use prompt_refine::pipeline::{RecordingObserver, RefineState};
use prompt_refine::secrets::StaticSecretStore;
use prompt_refine::telemetry::InMemoryHistorySink;
use prompt_refine::{BoxStream, Error, GenerativeService, RefineConfig, RefinementPipeline, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;

pub const DARK_MODE: [&str; 3] = ["Implement ", "a dark mode ", "toggle."];

/// Generative service driven by a script: optional gate before each call,
/// queued errors for the first calls, then a fixed fragment sequence.
pub struct ScriptedService {
    calls: AtomicU32,
    fragments: Vec<String>,
    errors: Mutex<VecDeque<String>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedService {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            errors: Mutex::new(VecDeque::new()),
            gate: None,
        }
    }

    pub fn failing_first(self, errors: &[&str]) -> Self {
        *self.errors.lock().unwrap() = errors.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Each call waits for one `notify_one` on the gate.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn begin(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.errors.lock().unwrap().pop_front() {
            Some(e) => Err(Error::runtime(e)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GenerativeService for ScriptedService {
    async fn send(&self, _prompt: &str, _credential: &str) -> Result<String> {
        self.begin().await?;
        Ok(self.fragments.concat())
    }

    async fn stream(&self, _prompt: &str, _credential: &str) -> Result<BoxStream<'static, String>> {
        self.begin().await?;
        let items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Streams whatever the test pushes through the returned sender.
pub struct ChannelService {
    calls: AtomicU32,
    rx: Mutex<Option<mpsc::Receiver<Result<String>>>>,
}

impl ChannelService {
    pub fn new() -> (Arc<Self>, mpsc::Sender<Result<String>>) {
        let (tx, rx) = mpsc::channel(16);
        let service = Arc::new(Self {
            calls: AtomicU32::new(0),
            rx: Mutex::new(Some(rx)),
        });
        (service, tx)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeService for ChannelService {
    async fn send(&self, _prompt: &str, _credential: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::runtime("send is not scripted"))
    }

    async fn stream(&self, _prompt: &str, _credential: &str) -> Result<BoxStream<'static, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::runtime("stream already consumed"))?;
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

pub fn test_config() -> RefineConfig {
    RefineConfig {
        initial_retry_delay_ms: 10,
        ..RefineConfig::default()
    }
}

pub fn build_pipeline(
    service: Arc<dyn GenerativeService>,
    sink: Arc<InMemoryHistorySink>,
    config: RefineConfig,
) -> RefinementPipeline {
    RefinementPipeline::builder(service)
        .config(config)
        .secret_store(Arc::new(StaticSecretStore::new("sk-test")))
        .history_sink(sink)
        .build()
        .expect("valid pipeline")
}

/// Yields until `observer` has seen `state`.
pub async fn wait_for_state(observer: &RecordingObserver, state: RefineState) {
    for _ in 0..10_000 {
        if observer.snapshot().states.contains(&state) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("observer never reached {state}");
}

pub async fn wait_for_fragments(observer: &RecordingObserver, n: usize) {
    for _ in 0..10_000 {
        if observer.snapshot().fragments.len() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("observer never received {n} fragments");
}
