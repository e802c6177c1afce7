//! 类型系统模块：定义跨厂商统一的请求、消息与流式增量类型。
//!
//! # Types Module
//!
//! Vendor-neutral data types shared by the drivers, the decode pipeline and the
//! public client surface.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatRequest`] | One request shape for every vendor |
//! | [`Message`] | Chat message with role and content |
//! | [`CanonicalDelta`] | One incremental unit of streamed output |
//! | [`StreamChunk`] | Public `chat.completion.chunk` projection of a delta |
//! | [`ChatCompletion`] | Whole (non-streaming) completion |
//! | [`ToolCall`] | Function/tool call from model response |
//!
//! ## Example
//!
//! ```rust
//! use hchat_rust::types::{ChatRequest, Message, ToolDefinition};
//!
//! let tool = ToolDefinition::function(
//!     "get_weather",
//!     "Get current weather for a location",
//!     serde_json::json!({
//!         "type": "object",
//!         "properties": { "location": {"type": "string"} }
//!     }),
//! );
//!
//! let req = ChatRequest::with_messages("claude-sonnet-4", vec![Message::user("Weather in Seoul?")])
//!     .system("You are a helpful assistant")
//!     .tools(vec![tool]);
//! assert_eq!(req.effective_max_tokens(), 4096);
//! ```

pub mod events;
pub mod message;
pub mod request;
pub mod response;
pub mod tool;

pub use events::{
    CanonicalDelta, FinishReason, StreamChunk, ThinkingDelta, ThinkingMarker, ToolCallFragment,
};
pub use message::{ContentPart, ImageUrl, Message, MessageContent, MessageRole};
pub use request::ChatRequest;
pub use response::{ChatCompletion, Choice, ResponseMessage, Usage};
pub use tool::{FunctionCall, FunctionDefinition, ToolCall, ToolDefinition};
