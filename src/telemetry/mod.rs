//! 调试钩子：观察每个规范化增量（包括不会出现在文本流中的工具调用片段）。
//!
//! Delta observation hook.
//!
//! The plain-text stream only carries content. Tool-call fragments, thinking
//! markers and finish reasons are visible through a [`DeltaSink`] injected on the
//! client builder. Sinks observe; they never alter or stop the stream, and a
//! sink error is logged and ignored.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`DeltaEvent`] | One observed delta with its provider and model |
//! | [`NoopDeltaSink`] | Default sink, observes nothing |
//! | [`TracingDeltaSink`] | Emits every delta as a `tracing` debug event |
//! | [`InMemoryDeltaSink`] | Bounded in-memory sink for tests |
//! | [`CompositeDeltaSink`] | Fans one event out to several sinks |

use crate::drivers::ProviderKind;
use crate::types::events::CanonicalDelta;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaEvent {
    /// Id shared by every event of one stream.
    pub stream_id: String,
    pub provider: ProviderKind,
    pub model: String,
    pub delta: CanonicalDelta,
    pub timestamp: f64,
}

impl DeltaEvent {
    pub fn new(
        stream_id: impl Into<String>,
        provider: ProviderKind,
        model: impl Into<String>,
        delta: CanonicalDelta,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            provider,
            model: model.into(),
            delta,
            timestamp: timestamp(),
        }
    }
}

#[async_trait]
pub trait DeltaSink: Send + Sync {
    async fn observe(&self, event: DeltaEvent) -> Result<()>;
}

pub struct NoopDeltaSink;

#[async_trait]
impl DeltaSink for NoopDeltaSink {
    async fn observe(&self, _: DeltaEvent) -> Result<()> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn DeltaSink> {
    Arc::new(NoopDeltaSink)
}

/// Logs each delta at debug level under the `hchat_rust::delta` target.
#[derive(Debug, Default)]
pub struct TracingDeltaSink;

#[async_trait]
impl DeltaSink for TracingDeltaSink {
    async fn observe(&self, event: DeltaEvent) -> Result<()> {
        for fragment in &event.delta.tool_calls {
            tracing::debug!(
                target: "hchat_rust::delta",
                stream_id = %event.stream_id,
                provider = %event.provider,
                model = %event.model,
                index = fragment.index,
                id = ?fragment.id,
                name = ?fragment.name,
                arguments_chunk = ?fragment.arguments_chunk,
                "tool-call fragment"
            );
        }
        tracing::debug!(
            target: "hchat_rust::delta",
            stream_id = %event.stream_id,
            provider = %event.provider,
            model = %event.model,
            content = ?event.delta.content,
            thinking = ?event.delta.thinking,
            finish_reason = ?event.delta.finish_reason,
            "delta"
        );
        Ok(())
    }
}

/// In-memory sink for testing. Oldest events are dropped past `max_events`.
pub struct InMemoryDeltaSink {
    events: Arc<RwLock<Vec<DeltaEvent>>>,
    max_events: usize,
}

impl InMemoryDeltaSink {
    pub fn new(max: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events: max,
        }
    }

    pub fn get_events(&self) -> Vec<DeltaEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn get_events_by_stream(&self, stream_id: &str) -> Vec<DeltaEvent> {
        self.get_events()
            .into_iter()
            .filter(|e| e.stream_id == stream_id)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeltaSink for InMemoryDeltaSink {
    async fn observe(&self, event: DeltaEvent) -> Result<()> {
        let mut events = self
            .events
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
        if events.len() > self.max_events {
            events.remove(0);
        }
        Ok(())
    }
}

/// Composite sink for multiple destinations.
#[derive(Default)]
pub struct CompositeDeltaSink {
    sinks: Vec<Arc<dyn DeltaSink>>,
}

impl CompositeDeltaSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(mut self, sink: Arc<dyn DeltaSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl DeltaSink for CompositeDeltaSink {
    async fn observe(&self, event: DeltaEvent) -> Result<()> {
        for s in &self.sinks {
            let _ = s.observe(event.clone()).await;
        }
        Ok(())
    }
}
