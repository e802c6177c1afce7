//! 流水线处理模块：把原始字节流逐级转换为统一的增量事件。
//!
//! # Streaming Pipeline
//!
//! Turns a vendor response body into a sequence of [`CanonicalDelta`]s.
//!
//! ```text
//! Raw Bytes → Utf8FrameReader → SseEventAssembler → JSON payloads → ProviderDriver::adapt → CanonicalDelta
//!     │              │                  │                  │                   │
//!   HTTP       partial UTF-8       blank-line         [DONE] stop,       per-stream
//!   body       held back           framing            bad JSON skipped   AdapterState
//! ```
//!
//! Everything after the byte source is synchronous; the only suspension point is
//! waiting for the next chunk of the body. Each call to [`Pipeline::process_stream`]
//! owns its own buffers and adapter state, so one `Pipeline` can serve concurrent streams.
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`sse`] | Frame reader and SSE event assembler (sync) |
//! | [`decode`] | Async decode stages and the [`Decoder`] implementation |
//! | [`event_map`] | Adapter stage: JSON payloads → canonical deltas |

pub mod decode;
pub mod event_map;
pub mod sse;


use std::sync::Arc;

use crate::drivers::ProviderDriver;
use crate::types::events::CanonicalDelta;
use crate::{BoxStream, PipeResult};

pub use decode::SseDecoder;
pub use event_map::DeltaMapper;
pub use sse::{SseEvent, SseEventAssembler, Utf8FrameReader};

/// Decoder trait for stream decoding
#[async_trait::async_trait]
pub trait Decoder: Send + Sync {
    /// Decode a byte stream into JSON values
    async fn decode_stream(
        &self,
        input: BoxStream<'static, bytes::Bytes>,
    ) -> PipeResult<BoxStream<'static, serde_json::Value>>;
}

/// Final stage: vendor JSON payloads to canonical deltas
#[async_trait::async_trait]
pub trait Mapper: Send + Sync {
    async fn map(
        &self,
        input: BoxStream<'static, serde_json::Value>,
    ) -> PipeResult<BoxStream<'static, CanonicalDelta>>;
}

/// Pipeline error types
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("SSE event exceeds {limit} bytes without a terminator{}", .hint.as_ref().map(|h| format!("\n💡 Hint: {}", h)).unwrap_or_default())]
    EventTooLarge { limit: usize, hint: Option<String> },
}

impl PipelineError {
    /// Attach an actionable hint to the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        let hint_val = Some(hint.into());
        match self {
            PipelineError::EventTooLarge { ref mut hint, .. } => *hint = hint_val,
        }
        self
    }
}

/// Decoder + mapper for one vendor and model.
pub struct Pipeline {
    decoder: Box<dyn Decoder>,
    mapper: Box<dyn Mapper>,
}

impl Pipeline {
    pub fn new(decoder: Box<dyn Decoder>, mapper: Box<dyn Mapper>) -> Self {
        Self { decoder, mapper }
    }

    /// SSE decoding followed by `driver`'s adapter.
    pub fn for_driver(driver: Arc<dyn ProviderDriver>, model: impl Into<String>) -> Self {
        Self::new(
            Box::new(SseDecoder::new()),
            Box::new(DeltaMapper::new(driver, model)),
        )
    }

    /// Process a byte stream through the pipeline
    pub async fn process_stream(
        &self,
        input: BoxStream<'static, bytes::Bytes>,
    ) -> PipeResult<BoxStream<'static, CanonicalDelta>> {
        let payloads = self.decoder.decode_stream(input).await?;
        self.mapper.map(payloads).await
    }
}
