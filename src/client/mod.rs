//! 客户端入口：按模型前缀分发到对应厂商驱动。
//!
//! Client surface. [`HChatClient`] resolves the vendor from the model name,
//! normalizes the request, and exposes the response as plain text, canonical
//! deltas, OpenAI-style chunks, or a single completion.

pub mod builder;
pub mod core;
pub mod routing;
pub mod types;

pub use builder::HChatClientBuilder;
pub use core::HChatClient;
pub use routing::{ModelRouter, RouteRule};
pub use types::{CancelHandle, ControlledStream, ThinkingRender};
