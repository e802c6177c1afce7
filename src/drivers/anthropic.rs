//! Claude Messages API 驱动 — 实现 Claude 特有的请求/响应格式转换
//!
//! Claude Messages API driver. Handles the key differences from OpenAI:
//! - System messages are a top-level `system` parameter, not part of `messages`.
//! - Tool results travel as `user` messages holding a `tool_result` block.
//! - Streaming uses block lifecycle events (`content_block_start` / `_delta` / `_stop`).
//! - Thinking arrives as its own block and is bracketed with open/close markers.
//!
//! Every tool-call fragment is reported at index 0; a new `tool_use` block is
//! recognised by the fragment carrying an id.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::Error;
use crate::types::events::{CanonicalDelta, FinishReason, ThinkingMarker, ToolCallFragment};
use crate::types::message::{ContentPart, ImageUrl, Message, MessageContent, MessageRole};
use crate::types::request::ChatRequest;
use crate::types::response::{ChatCompletion, ResponseMessage, Usage};
use crate::types::tool::ToolCall;

use super::{
    endpoint_url, error_message, merge_advanced, now_secs, AdapterState, DriverRequest,
    ProviderDriver, ProviderKind,
};

const FINISH_REASONS: &[(&str, FinishReason)] = &[
    ("end_turn", FinishReason::Stop),
    ("max_tokens", FinishReason::Length),
    ("stop_sequence", FinishReason::Stop),
    ("tool_use", FinishReason::ToolCalls),
];

/// Claude Messages API driver.
#[derive(Debug, Default)]
pub struct AnthropicDriver;

impl AnthropicDriver {
    pub fn new() -> Self {
        Self
    }

    /// Top-level system prompt: the request's `system` followed by any system-role messages.
    fn collect_system(request: &ChatRequest) -> Option<String> {
        let mut parts: Vec<String> = request.system.iter().cloned().collect();
        parts.extend(
            request
                .messages
                .iter()
                .filter(|m| m.role == MessageRole::System)
                .map(|m| m.text()),
        );
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    fn convert_messages(messages: &[Message]) -> Result<Vec<Value>, Error> {
        let mut out = Vec::with_capacity(messages.len());
        for m in messages {
            match m.role {
                MessageRole::System => continue,
                MessageRole::Tool => {
                    let content = match &m.content {
                        MessageContent::Text(s) => s.clone(),
                        other => serde_json::to_string(other)?,
                    };
                    out.push(serde_json::json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                            "content": content,
                        }],
                    }));
                }
                MessageRole::Assistant if m.tool_calls.is_some() => {
                    let mut content = Vec::new();
                    let text = m.text();
                    if !text.is_empty() {
                        content.push(serde_json::json!({ "type": "text", "text": text }));
                    }
                    for call in m.tool_calls.iter().flatten() {
                        content.push(serde_json::json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.function.name,
                            "input": call.arguments_json()?,
                        }));
                    }
                    out.push(serde_json::json!({ "role": "assistant", "content": content }));
                }
                MessageRole::User | MessageRole::Assistant => {
                    out.push(serde_json::json!({
                        "role": m.role.as_str(),
                        "content": Self::convert_content(&m.content),
                    }));
                }
            }
        }
        Ok(out)
    }

    fn convert_content(content: &MessageContent) -> Value {
        match content {
            MessageContent::Text(s) => Value::String(s.clone()),
            MessageContent::Parts(parts) => Value::Array(
                parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => {
                            serde_json::json!({ "type": "text", "text": text })
                        }
                        ContentPart::Image { image_url } => Self::image_block(image_url),
                    })
                    .collect(),
            ),
        }
    }

    fn image_block(image: &ImageUrl) -> Value {
        if image.url.starts_with("data:") {
            serde_json::json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": image.media_type(),
                    "data": image.base64_data(),
                },
            })
        } else {
            serde_json::json!({
                "type": "image",
                "source": { "type": "url", "url": image.url },
            })
        }
    }

    fn stream_error(&self, message: String) -> Error {
        Error::Stream {
            provider: self.kind().id().into(),
            message,
        }
    }
}

impl ProviderDriver for AnthropicDriver {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn build_request(
        &self,
        request: &ChatRequest,
        base_url: &str,
        api_key: &str,
        stream: bool,
    ) -> Result<DriverRequest, Error> {
        let max_tokens = request.effective_max_tokens();
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::convert_messages(&request.messages)?,
            "max_tokens": max_tokens,
            "temperature": request.effective_temperature(),
            "stream": stream,
        });

        if let Some(system) = Self::collect_system(request) {
            body["system"] = Value::String(system);
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.function.name,
                        "description": t.function.description,
                        "input_schema": t.parameters_or_empty(),
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = serde_json::json!({ "type": "auto" });
        }
        if request.thinking {
            body["thinking"] = serde_json::json!({
                "type": "enabled",
                "budget_tokens": max_tokens / 2,
            });
            body["temperature"] = serde_json::json!(1);
        }
        merge_advanced(&mut body, request, "claude");

        let mut headers = HashMap::new();
        headers.insert("Authorization".into(), api_key.to_string());

        Ok(DriverRequest {
            provider: ProviderKind::Claude,
            url: endpoint_url(base_url, "/claude/messages", &[])?,
            method: "POST".into(),
            headers,
            body,
            stream,
        })
    }

    fn parse_response(&self, body: &Value, model: &str) -> Result<ChatCompletion, Error> {
        if body.get("type").and_then(|t| t.as_str()) == Some("error") {
            return Err(Error::Response {
                provider: self.kind().id().into(),
                message: error_message(&body["error"]),
            });
        }

        let mut content = String::new();
        let mut thinking = String::new();
        let mut tool_calls = Vec::new();
        for block in body
            .get("content")
            .and_then(|c| c.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
        {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => content.push_str(block["text"].as_str().unwrap_or("")),
                Some("thinking") => thinking.push_str(block["thinking"].as_str().unwrap_or("")),
                Some("tool_use") => tool_calls.push(ToolCall::new(
                    block["id"].as_str().unwrap_or(""),
                    block["name"].as_str().unwrap_or(""),
                    block.get("input").map(Value::to_string).unwrap_or_default(),
                )),
                _ => {}
            }
        }

        let finish_reason = Some(
            body.get("stop_reason")
                .and_then(|v| v.as_str())
                .map(|r| self.map_finish_reason(r))
                .unwrap_or(FinishReason::Stop),
        );

        let usage = body.get("usage").map(|u| {
            let mut usage = Usage::new(
                u["input_tokens"].as_u64().unwrap_or(0),
                u["output_tokens"].as_u64().unwrap_or(0),
            );
            usage.thinking_tokens = u.get("thinking_tokens").and_then(|t| t.as_u64());
            usage
        });

        Ok(ChatCompletion::single(
            body.get("id")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            model,
            now_secs(),
            ResponseMessage::assistant(
                Some(content),
                (!thinking.is_empty()).then_some(thinking),
                tool_calls,
            ),
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
        let event_type = payload.get("type").and_then(|t| t.as_str()).unwrap_or("");

        match event_type {
            "content_block_start" => {
                let block = &payload["content_block"];
                match block.get("type").and_then(|t| t.as_str()) {
                    Some("thinking") => Ok((state.enter_thinking(), None)),
                    Some("tool_use") => {
                        let fragment = ToolCallFragment::start(
                            0,
                            block["id"].as_str().unwrap_or(""),
                            block["name"].as_str().unwrap_or(""),
                        );
                        Ok((state, Some(CanonicalDelta::tool_call(fragment))))
                    }
                    _ => Ok((state, None)),
                }
            }
            "content_block_delta" => {
                let delta = &payload["delta"];
                match delta.get("type").and_then(|t| t.as_str()) {
                    Some("thinking_delta") => {
                        let text = delta["thinking"].as_str().unwrap_or("");
                        if text.is_empty() {
                            return Ok((state, None));
                        }
                        if state.thinking_block_started {
                            Ok((state, Some(CanonicalDelta::thinking(ThinkingMarker::Text, text))))
                        } else {
                            Ok((
                                state.mark_started(),
                                Some(CanonicalDelta::thinking(ThinkingMarker::Open, text)),
                            ))
                        }
                    }
                    Some("text_delta") => {
                        let text = delta["text"].as_str().unwrap_or("");
                        if text.is_empty() {
                            Ok((state, None))
                        } else {
                            Ok((state, Some(CanonicalDelta::text(text))))
                        }
                    }
                    Some("input_json_delta") => {
                        let partial = delta["partial_json"].as_str().unwrap_or("");
                        if partial.is_empty() {
                            Ok((state, None))
                        } else {
                            let fragment = ToolCallFragment::arguments(0, partial);
                            Ok((state, Some(CanonicalDelta::tool_call(fragment))))
                        }
                    }
                    other => {
                        tracing::debug!(delta_type = ?other, "ignoring Claude delta");
                        Ok((state, None))
                    }
                }
            }
            "content_block_stop" => {
                if !state.in_thinking_block {
                    return Ok((state, None));
                }
                // A block that never produced a delta still gets both markers.
                let marker = if state.thinking_block_started {
                    ThinkingMarker::Close
                } else {
                    ThinkingMarker::Block
                };
                Ok((state.leave_thinking(), Some(CanonicalDelta::thinking(marker, ""))))
            }
            "message_delta" => {
                if let Some(reason) = payload.pointer("/delta/stop_reason").and_then(|r| r.as_str()) {
                    tracing::debug!(stop_reason = reason, "Claude stop reason hint");
                }
                Ok((state, None))
            }
            // Authoritative end of message, whatever message_delta said.
            "message_stop" => Ok((state, Some(CanonicalDelta::finish(FinishReason::Stop)))),
            "error" => Err(self.stream_error(error_message(&payload["error"]))),
            other => {
                tracing::debug!(event_type = other, "ignoring Claude stream event");
                Ok((state, None))
            }
        }
    }

    fn finish_reasons(&self) -> &'static [(&'static str, FinishReason)] {
        FINISH_REASONS
    }
}
