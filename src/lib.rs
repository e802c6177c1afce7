//! # hchat-rust
//!
//! 统一的多厂商流式对话客户端：一种请求形状，对接 OpenAI、Claude 与 Gemini。
//!
//! Multi-vendor chat client with a streaming core. One request shape reaches
//! OpenAI (Azure-style gateway), Claude and Gemini. Each vendor's native
//! response, streamed or whole, comes back in one canonical form.
//!
//! ## Overview
//!
//! A streaming call flows through a fixed pipeline:
//!
//! ```text
//! HTTP body → UTF-8 frames → SSE events → JSON payloads → vendor adapter → CanonicalDelta
//! ```
//!
//! - **Dispatch by model prefix**: `gpt-*`, `claude-*`, `gemini-*` (case-insensitive);
//!   anything else is [`Error::UnknownModel`].
//! - **Tolerant decoding**: a malformed event payload is logged and skipped; the
//!   `[DONE]` sentinel ends the stream even if more bytes follow.
//! - **Thinking as structure**: adapters emit thinking as a tagged field; the client
//!   decides whether to inline it as `<thinking>` text or drop it.
//! - **Per-stream state**: adapter state is a value owned by one stream, so one
//!   client serves concurrent streams safely.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use hchat_rust::{ChatRequest, HChatClient};
//!
//! #[tokio::main]
//! async fn main() -> hchat_rust::Result<()> {
//!     let client = HChatClient::from_env()?;
//!     let request = ChatRequest::new("claude-sonnet-4", "Why is the sky blue?").thinking(true);
//!
//!     let mut stream = client.stream(&request).await?;
//!     while let Some(text) = stream.next().await {
//!         print!("{}", text?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | `HChatClient` dispatcher, builder, routing, cancellation |
//! | [`drivers`] | Per-vendor request normalization, response parsing, stream adapters |
//! | [`pipeline`] | SSE framing and JSON decoding stages |
//! | [`types`] | Requests, messages, tools, canonical deltas, completions |
//! | [`transport`] | `Transport` trait and the reqwest implementation |
//! | [`config`] | `ClientConfig` from YAML and environment |
//! | [`telemetry`] | `DeltaSink` observation hook |
//! | [`error_code`] | Feature-error classification of vendor failures |

pub mod client;
pub mod config;
pub mod drivers;
pub mod error_code;
pub mod pipeline;
pub mod telemetry;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use client::{CancelHandle, HChatClient, HChatClientBuilder, ThinkingRender};
pub use config::ClientConfig;
pub use drivers::ProviderKind;
pub use error_code::FeatureErrorCode;
pub use telemetry::{DeltaEvent, DeltaSink};
pub use types::{
    events::{CanonicalDelta, FinishReason, StreamChunk, ThinkingMarker, ToolCallFragment},
    message::{ContentPart, Message, MessageContent, MessageRole},
    request::ChatRequest,
    response::ChatCompletion,
    tool::{ToolCall, ToolDefinition},
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for pipeline operations
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
