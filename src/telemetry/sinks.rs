use super::{HistorySink, RefinementRecord, TelemetryEvent};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Bounded in-memory history; oldest entries are dropped first.
pub struct InMemoryHistorySink {
    refinements: RwLock<VecDeque<RefinementRecord>>,
    events: RwLock<VecDeque<TelemetryEvent>>,
    max_entries: usize,
}

impl InMemoryHistorySink {
    pub fn new(max: usize) -> Self {
        Self {
            refinements: RwLock::new(VecDeque::new()),
            events: RwLock::new(VecDeque::new()),
            max_entries: max.max(1),
        }
    }
    pub fn refinements(&self) -> Vec<RefinementRecord> {
        read(&self.refinements).iter().cloned().collect()
    }
    pub fn events(&self) -> Vec<TelemetryEvent> {
        read(&self.events).iter().cloned().collect()
    }
    pub fn events_named(&self, name: &str) -> Vec<TelemetryEvent> {
        read(&self.events)
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }
    pub fn clear(&self) {
        write(&self.refinements).clear();
        write(&self.events).clear();
    }
    pub fn len(&self) -> usize {
        read(&self.refinements).len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, max: usize) {
    queue.push_back(item);
    while queue.len() > max {
        queue.pop_front();
    }
}

#[async_trait]
impl HistorySink for InMemoryHistorySink {
    async fn record_refinement(&self, record: RefinementRecord) -> Result<()> {
        push_bounded(&mut write(&self.refinements), record, self.max_entries);
        Ok(())
    }
    async fn record_event(&self, event: TelemetryEvent) -> Result<()> {
        push_bounded(&mut write(&self.events), event, self.max_entries);
        Ok(())
    }
}

/// Logs records through `tracing` (useful with a subscriber that ships logs elsewhere).
pub struct TracingHistorySink {
    prefix: String,
}

impl TracingHistorySink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for TracingHistorySink {
    fn default() -> Self {
        Self::new("history")
    }
}

#[async_trait]
impl HistorySink for TracingHistorySink {
    async fn record_refinement(&self, record: RefinementRecord) -> Result<()> {
        info!(
            sink = self.prefix.as_str(),
            id = record.id.as_str(),
            model = record.model_id.as_str(),
            framework = record.framework.as_deref().unwrap_or(""),
            input_len = record.original.len(),
            output_len = record.refined.len(),
            "refinement recorded"
        );
        Ok(())
    }
    async fn record_event(&self, event: TelemetryEvent) -> Result<()> {
        let data = event.data.map(|d| d.to_string()).unwrap_or_default();
        info!(sink = self.prefix.as_str(), event = event.name.as_str(), data = data.as_str(), "telemetry event");
        Ok(())
    }
}

/// Composite sink for multiple destinations. Member failures are ignored so one
/// broken destination does not starve the others.
#[derive(Default)]
pub struct CompositeHistorySink {
    sinks: Vec<Arc<dyn HistorySink>>,
}

impl CompositeHistorySink {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_sink(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl HistorySink for CompositeHistorySink {
    async fn record_refinement(&self, record: RefinementRecord) -> Result<()> {
        for s in &self.sinks {
            let _ = s.record_refinement(record.clone()).await;
        }
        Ok(())
    }
    async fn record_event(&self, event: TelemetryEvent) -> Result<()> {
        for s in &self.sinks {
            let _ = s.record_event(event.clone()).await;
        }
        Ok(())
    }
    async fn close(&self) -> Result<()> {
        for s in &self.sinks {
            let _ = s.close().await;
        }
        Ok(())
    }
}
