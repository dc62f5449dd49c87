//! History and telemetry sinks.
//!
//! The pipeline reports a [`RefinementRecord`] and a few [`TelemetryEvent`]s
//! after a fully successful refinement (or a cache hit). Sinks are
//! fire-and-forget: a failing sink is logged and never fails the request.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`HistorySink`] | Trait for history/telemetry destinations |
//! | [`NoopHistorySink`] | Default sink (records nothing) |
//! | [`InMemoryHistorySink`] | Bounded session history, also used by tests |
//! | [`TracingHistorySink`] | Emits records as `tracing` events |
//! | [`CompositeHistorySink`] | Fan-out to several sinks |

mod sinks;

pub use sinks::{CompositeHistorySink, InMemoryHistorySink, TracingHistorySink};

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Event names emitted by the pipeline.
pub mod events {
    pub const CACHE_HIT: &str = "refine.cache_hit";
    pub const COMPLETED: &str = "refine.completed";
    pub const DEDUPLICATED: &str = "refine.deduplicated";
}

fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// One completed refinement: the original request and what it became.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRecord {
    pub id: String,
    pub original: String,
    pub refined: String,
    pub model_id: String,
    pub framework: Option<String>,
    pub timestamp: f64,
}

impl RefinementRecord {
    pub fn new(
        original: impl Into<String>,
        refined: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original: original.into(),
            refined: refined.into(),
            model_id: model_id.into(),
            framework: None,
            timestamp: timestamp(),
        }
    }

    pub fn with_framework(mut self, framework: Option<String>) -> Self {
        self.framework = framework;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub data: Option<serde_json::Value>,
    pub timestamp: f64,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
            timestamp: timestamp(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record_refinement(&self, record: RefinementRecord) -> Result<()>;

    async fn record_event(&self, _event: TelemetryEvent) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct NoopHistorySink;

#[async_trait]
impl HistorySink for NoopHistorySink {
    async fn record_refinement(&self, _: RefinementRecord) -> Result<()> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn HistorySink> {
    Arc::new(NoopHistorySink)
}
