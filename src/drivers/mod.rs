//! Provider 驱动抽象层 — 通过 trait 实现多厂商 API 适配的动态分发
//!
//! Provider driver abstraction. Each vendor API (OpenAI, Claude, Gemini) has one
//! concrete driver that knows how to:
//! - normalize a [`ChatRequest`] into the vendor's wire request,
//! - parse a whole (non-streaming) response into a [`ChatCompletion`],
//! - adapt one streamed JSON payload into at most one [`CanonicalDelta`].
//!
//! Drivers hold no per-stream state. Streaming state is an [`AdapterState`] value
//! that the caller threads through [`ProviderDriver::adapt`], so one driver can
//! serve any number of concurrent streams.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ErrorContext};
use crate::types::events::{CanonicalDelta, FinishReason};
use crate::types::request::ChatRequest;
use crate::types::response::ChatCompletion;

pub use anthropic::AnthropicDriver;
pub use gemini::GeminiDriver;
pub use openai::OpenAiDriver;

/// Vendor served by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Claude,
    Gemini,
}

impl ProviderKind {
    /// Short provider id used in errors and logs.
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Per-stream adapter state.
///
/// `thinking_block_started` is only ever true while `in_thinking_block` is true;
/// both reset when a thinking block closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterState {
    pub in_thinking_block: bool,
    pub thinking_block_started: bool,
}

impl AdapterState {
    pub fn enter_thinking(self) -> Self {
        Self {
            in_thinking_block: true,
            thinking_block_started: false,
        }
    }

    pub fn mark_started(self) -> Self {
        Self {
            in_thinking_block: true,
            thinking_block_started: true,
        }
    }

    pub fn leave_thinking(self) -> Self {
        Self::default()
    }
}

/// Unified HTTP request representation for provider communication.
#[derive(Debug, Clone)]
pub struct DriverRequest {
    pub provider: ProviderKind,
    /// Fully resolved URL, including query parameters.
    pub url: String,
    /// HTTP method (always POST for chat).
    pub method: String,
    pub headers: HashMap<String, String>,
    /// Serialized JSON request body.
    pub body: Value,
    /// Whether streaming is requested.
    pub stream: bool,
}

/// Core trait for provider-specific API adaptation.
///
/// The trait is object-safe and supports dynamic dispatch via `Arc<dyn ProviderDriver>`.
pub trait ProviderDriver: Send + Sync + fmt::Debug {
    fn kind(&self) -> ProviderKind;

    /// Build a provider-specific HTTP request from the unified request.
    fn build_request(
        &self,
        request: &ChatRequest,
        base_url: &str,
        api_key: &str,
        stream: bool,
    ) -> Result<DriverRequest, Error>;

    /// Parse a non-streaming response into unified format.
    fn parse_response(&self, body: &Value, model: &str) -> Result<ChatCompletion, Error>;

    /// Adapt one streamed payload.
    ///
    /// Returns the state for the next call and an optional delta; `None` means the
    /// payload carries nothing visible. A vendor error payload returns `Err`.
    fn adapt(
        &self,
        state: AdapterState,
        payload: &Value,
        model: &str,
    ) -> Result<(AdapterState, Option<CanonicalDelta>), Error>;

    /// Vendor-native finish reasons and their canonical values.
    fn finish_reasons(&self) -> &'static [(&'static str, FinishReason)];

    fn map_finish_reason(&self, native: &str) -> FinishReason {
        FinishReason::from_table(self.finish_reasons(), native)
    }
}

/// Driver instance for a provider.
pub fn create_driver(kind: ProviderKind) -> Arc<dyn ProviderDriver> {
    match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiDriver::new()),
        ProviderKind::Claude => Arc::new(AnthropicDriver::new()),
        ProviderKind::Gemini => Arc::new(GeminiDriver::new()),
    }
}

/// Shallow-merge `advanced.<vendor>` into a request body.
pub(crate) fn merge_advanced(body: &mut Value, request: &ChatRequest, vendor: &str) {
    if let (Some(overrides), Value::Object(map)) = (request.advanced_for(vendor), body) {
        for (k, v) in overrides {
            map.insert(k.clone(), v.clone());
        }
    }
}

/// `{base}{path}` with URL-encoded query parameters.
pub(crate) fn endpoint_url(
    base_url: &str,
    path: &str,
    query: &[(&str, &str)],
) -> Result<String, Error> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url = url::Url::parse(&raw).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid endpoint URL: {}", e),
            ErrorContext::new()
                .with_field_path("config.base_url")
                .with_details(raw.clone()),
        )
    })?;
    // An empty query_pairs_mut() would still leave a bare `?`.
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url.to_string())
}

/// Message text of a vendor `error` object, whatever its shape.
pub(crate) fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .map(String::from)
        .unwrap_or_else(|| error.to_string())
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
