//! Unified chat request

use serde::{Deserialize, Serialize};

use super::message::Message;
use super::tool::ToolDefinition;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// One request shape for every vendor. Drivers translate it into their wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Vendor-prefixed model name, e.g. `gpt-4o`, `claude-sonnet-4`, `gemini-2.5-flash`.
    pub model: String,
    #[serde(default)]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub thinking: bool,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Vendor-keyed raw overrides, e.g. `{"openai": {"top_p": 0.9}}`.
    #[serde(default)]
    pub advanced: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Single user turn.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::with_messages(model, vec![Message::user(prompt)])
    }

    pub fn with_messages(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages,
            thinking: false,
            max_tokens: None,
            temperature: None,
            tools: Vec::new(),
            advanced: None,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn thinking(mut self, enable: bool) -> Self {
        self.thinking = enable;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn advanced(mut self, advanced: serde_json::Value) -> Self {
        self.advanced = Some(advanced);
        self
    }

    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn effective_temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Vendor-specific override object from `advanced`, if any.
    pub fn advanced_for(&self, vendor: &str) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.advanced.as_ref()?.get(vendor)?.as_object()
    }
}
