//! OpenAI (Azure deployment) chat completions driver.
//!
//! The streamed chunks already have the canonical shape, so the adapter only
//! relabels `choices[0].delta` into a [`CanonicalDelta`].

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Error;
use crate::types::events::{CanonicalDelta, FinishReason, ToolCallFragment};
use crate::types::message::{ContentPart, Message, MessageContent, MessageRole};
use crate::types::request::ChatRequest;
use crate::types::response::{ChatCompletion, ResponseMessage, Usage};
use crate::types::tool::ToolCall;

use super::{
    endpoint_url, error_message, merge_advanced, now_secs, AdapterState, DriverRequest,
    ProviderDriver, ProviderKind,
};

pub const API_VERSION: &str = "2024-10-21";

const FINISH_REASONS: &[(&str, FinishReason)] = &[
    ("stop", FinishReason::Stop),
    ("length", FinishReason::Length),
    ("tool_calls", FinishReason::ToolCalls),
    ("function_call", FinishReason::ToolCalls),
    ("content_filter", FinishReason::ContentFilter),
];

#[derive(Debug, Default)]
pub struct OpenAiDriver;

impl OpenAiDriver {
    pub fn new() -> Self {
        Self
    }

    fn convert_message(m: &Message) -> Value {
        let content = match &m.content {
            MessageContent::Text(s) => Value::String(s.clone()),
            MessageContent::Parts(parts) => Value::Array(
                parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => {
                            serde_json::json!({ "type": "text", "text": text })
                        }
                        ContentPart::Image { image_url } => {
                            serde_json::json!({ "type": "image_url", "image_url": image_url })
                        }
                    })
                    .collect(),
            ),
        };
        let mut obj = serde_json::json!({ "role": m.role.as_str(), "content": content });
        if m.role == MessageRole::Tool {
            if let Some(ref id) = m.tool_call_id {
                obj["tool_call_id"] = Value::String(id.clone());
            }
        }
        if let Some(ref calls) = m.tool_calls {
            obj["tool_calls"] = serde_json::to_value(calls).unwrap_or(Value::Null);
        }
        obj
    }
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Option<Vec<ChunkChoicePayload>>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoicePayload {
    #[serde(default)]
    delta: Option<DeltaPayload>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeltaPayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDeltaPayload>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDeltaPayload {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDeltaPayload>,
}

#[derive(Debug, Deserialize)]
struct FunctionDeltaPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl ProviderDriver for OpenAiDriver {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn build_request(
        &self,
        request: &ChatRequest,
        base_url: &str,
        api_key: &str,
        stream: bool,
    ) -> Result<DriverRequest, Error> {
        let mut messages: Vec<Value> = Vec::with_capacity(request.messages.len() + 1);
        if let Some(ref system) = request.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.extend(request.messages.iter().map(Self::convert_message));

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.effective_max_tokens(),
            "temperature": request.effective_temperature(),
            "stream": stream,
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::to_value(&request.tools)?;
        }
        merge_advanced(&mut body, request, "openai");

        let url = endpoint_url(
            base_url,
            &format!("/openai/deployments/{}/chat/completions", request.model),
            &[("api-version", API_VERSION)],
        )?;

        let mut headers = HashMap::new();
        headers.insert("api-key".into(), api_key.to_string());

        Ok(DriverRequest {
            provider: ProviderKind::OpenAi,
            url,
            method: "POST".into(),
            headers,
            body,
            stream,
        })
    }

    fn parse_response(&self, body: &Value, model: &str) -> Result<ChatCompletion, Error> {
        if let Some(err) = body.get("error") {
            return Err(Error::Response {
                provider: self.kind().id().into(),
                message: error_message(err),
            });
        }

        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(String::from);
        let finish_reason = body
            .pointer("/choices/0/finish_reason")
            .and_then(|v| v.as_str())
            .map(|r| self.map_finish_reason(r));
        let tool_calls: Vec<ToolCall> = match body.pointer("/choices/0/message/tool_calls") {
            Some(v) if !v.is_null() => serde_json::from_value(v.clone())?,
            _ => Vec::new(),
        };
        let usage = body.get("usage").map(|u| Usage {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
            thinking_tokens: u
                .pointer("/completion_tokens_details/reasoning_tokens")
                .and_then(|t| t.as_u64()),
        });

        Ok(ChatCompletion::single(
            body.get("id")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            model,
            body.get("created")
                .and_then(|v| v.as_u64())
                .unwrap_or_else(now_secs),
            ResponseMessage::assistant(content, None, tool_calls),
            finish_reason,
            usage,
        ))
    }

    fn adapt(
        &self,
        state: AdapterState,
        payload: &Value,
        _model: &str,
    ) -> Result<(AdapterState, Option<CanonicalDelta>), Error> {
        if let Some(err) = payload.get("error") {
            return Err(Error::Stream {
                provider: self.kind().id().into(),
                message: error_message(err),
            });
        }

        let chunk = match ChunkPayload::deserialize(payload) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring non-chunk OpenAI payload");
                return Ok((state, None));
            }
        };
        // Azure sends a leading chunk with no choices (prompt filter results).
        let Some(choice) = chunk.choices.unwrap_or_default().into_iter().next() else {
            return Ok((state, None));
        };

        let delta = choice.delta.unwrap_or_default();
        let out = CanonicalDelta {
            content: delta.content.filter(|c| !c.is_empty()),
            thinking: None,
            tool_calls: delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| {
                    let (name, arguments) = match tc.function {
                        Some(f) => (f.name, f.arguments),
                        None => (None, None),
                    };
                    ToolCallFragment {
                        index: tc.index,
                        id: tc.id,
                        name,
                        arguments_chunk: arguments,
                    }
                })
                .collect(),
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map(|r| self.map_finish_reason(r)),
        };

        if out.is_empty() {
            Ok((state, None))
        } else {
            Ok((state, Some(out)))
        }
    }

    fn finish_reasons(&self) -> &'static [(&'static str, FinishReason)] {
        FINISH_REASONS
    }
}
