//! Google Gemini generateContent API 驱动 — 实现 Gemini 特有的请求/响应格式转换
//!
//! Gemini API driver. Key differences from OpenAI:
//! - Uses `contents` array with `parts` instead of `messages` with `content`.
//! - Role names: `user` and `model` (not `assistant`).
//! - System instructions are a separate `systemInstruction` field.
//! - The API key travels in the `key` query parameter.
//! - Each streamed payload is a whole candidate; thought parts arrive complete,
//!   so the adapter keeps no thinking state.

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
    ("STOP", FinishReason::Stop),
    ("MAX_TOKENS", FinishReason::Length),
    ("SAFETY", FinishReason::ContentFilter),
    ("RECITATION", FinishReason::ContentFilter),
    ("OTHER", FinishReason::Stop),
];

/// Google Gemini driver.
#[derive(Debug, Default)]
pub struct GeminiDriver;

impl GeminiDriver {
    pub fn new() -> Self {
        Self
    }

    fn system_instruction(request: &ChatRequest) -> Option<String> {
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

    /// Convert messages to Gemini `contents` format.
    fn convert_contents(messages: &[Message]) -> Result<Vec<Value>, Error> {
        let mut contents = Vec::with_capacity(messages.len());
        for m in messages {
            let role = match m.role {
                MessageRole::System => continue,
                MessageRole::Assistant => "model",
                MessageRole::User | MessageRole::Tool => "user",
            };
            let mut parts = Self::convert_parts(&m.content);
            for call in m.tool_calls.iter().flatten() {
                parts.push(serde_json::json!({
                    "functionCall": { "name": call.function.name, "args": call.arguments_json()? }
                }));
            }
            if parts.is_empty() {
                continue;
            }
            contents.push(serde_json::json!({ "role": role, "parts": parts }));
        }
        Ok(contents)
    }

    fn convert_parts(content: &MessageContent) -> Vec<Value> {
        match content {
            MessageContent::Text(s) if s.is_empty() => Vec::new(),
            MessageContent::Text(s) => vec![serde_json::json!({ "text": s })],
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => serde_json::json!({ "text": text }),
                    ContentPart::Image { image_url } => Self::inline_data(image_url),
                })
                .collect(),
        }
    }

    fn inline_data(image: &ImageUrl) -> Value {
        serde_json::json!({
            "inlineData": {
                "mimeType": image.media_type(),
                "data": image.base64_data(),
            }
        })
    }

    fn candidate_parts(payload: &Value) -> &[Value] {
        payload
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn function_call(part: &Value, index: usize) -> Option<ToolCall> {
        let call = part.get("functionCall")?;
        let id = format!("call_{}_{}", index, uuid::Uuid::new_v4().simple());
        let args = call.get("args").cloned().unwrap_or_else(|| serde_json::json!({}));
        Some(ToolCall::new(
            id,
            call["name"].as_str().unwrap_or(""),
            args.to_string(),
        ))
    }
}

impl ProviderDriver for GeminiDriver {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn build_request(
        &self,
        request: &ChatRequest,
        base_url: &str,
        api_key: &str,
        stream: bool,
    ) -> Result<DriverRequest, Error> {
        let max_tokens = request.effective_max_tokens();
        let mut generation_config = serde_json::json!({
            "maxOutputTokens": max_tokens,
            "temperature": request.effective_temperature(),
        });
        if request.thinking {
            generation_config["thinkingConfig"] = serde_json::json!({
                "includeThoughts": true,
                "thinkingBudget": max_tokens,
            });
            generation_config["temperature"] = serde_json::json!(1);
        }

        let mut body = serde_json::json!({
            "contents": Self::convert_contents(&request.messages)?,
            "generationConfig": generation_config,
        });
        if let Some(system) = Self::system_instruction(request) {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
        }
        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.function.name,
                        "description": t.function.description,
                        "parameters": t.parameters_or_empty(),
                    })
                })
                .collect();
            body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
        }
        merge_advanced(&mut body, request, "gemini");

        let url = if stream {
            endpoint_url(
                base_url,
                &format!("/models/{}:streamGenerateContent", request.model),
                &[("alt", "sse"), ("key", api_key)],
            )?
        } else {
            endpoint_url(
                base_url,
                &format!("/models/{}:generateContent", request.model),
                &[("key", api_key)],
            )?
        };

        Ok(DriverRequest {
            provider: ProviderKind::Gemini,
            url,
            method: "POST".into(),
            headers: HashMap::new(),
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
        let Some(candidate) = body.pointer("/candidates/0") else {
            return Err(Error::Response {
                provider: self.kind().id().into(),
                message: "no candidates in Gemini response".into(),
            });
        };

        let mut content = String::new();
        let mut thinking = String::new();
        let mut tool_calls = Vec::new();
        for (i, part) in Self::candidate_parts(body).iter().enumerate() {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                if part.get("thought").and_then(|t| t.as_bool()) == Some(true) {
                    thinking.push_str(text);
                } else {
                    content.push_str(text);
                }
            }
            if let Some(call) = Self::function_call(part, i) {
                tool_calls.push(call);
            }
        }

        let finish_reason = Some(
            candidate
                .get("finishReason")
                .and_then(|r| r.as_str())
                .map(|r| self.map_finish_reason(r))
                .unwrap_or(FinishReason::Stop),
        );

        let usage = body.get("usageMetadata").map(|u| Usage {
            prompt_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
            completion_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
            total_tokens: u["totalTokenCount"].as_u64().unwrap_or(0),
            thinking_tokens: u.get("thoughtsTokenCount").and_then(|t| t.as_u64()),
        });

        Ok(ChatCompletion::single(
            uuid::Uuid::new_v4().to_string(),
            body.get("modelVersion")
                .and_then(|v| v.as_str())
                .unwrap_or(model),
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
        if let Some(err) = payload.get("error") {
            return Err(Error::Stream {
                provider: self.kind().id().into(),
                message: error_message(err),
            });
        }

        let parts = Self::candidate_parts(payload);
        // First text part with content; empty parts (signature carriers) are skipped.
        let text_part = parts.iter().find(|p| {
            p.get("text")
                .and_then(|t| t.as_str())
                .is_some_and(|t| !t.is_empty())
        });
        let tool_calls: Vec<ToolCallFragment> = parts
            .iter()
            .enumerate()
            .filter_map(|(i, p)| Self::function_call(p, i))
            .enumerate()
            .map(|(index, call)| ToolCallFragment {
                index: index as u32,
                id: Some(call.id),
                name: Some(call.function.name),
                arguments_chunk: Some(call.function.arguments),
            })
            .collect();

        if text_part.is_none() && tool_calls.is_empty() {
            return Ok((state, None));
        }

        let mut delta = match text_part {
            Some(part) => {
                let text = part["text"].as_str().unwrap_or("");
                if part.get("thought").and_then(|t| t.as_bool()) == Some(true) {
                    CanonicalDelta::thinking(ThinkingMarker::Block, text)
                } else {
                    CanonicalDelta::text(text)
                }
            }
            None => CanonicalDelta::default(),
        };
        delta.tool_calls = tool_calls;
        let finish = payload
            .pointer("/candidates/0/finishReason")
            .and_then(|r| r.as_str())
            .map(|r| self.map_finish_reason(r));
        Ok((state, Some(delta.with_finish_reason(finish))))
    }

    fn finish_reasons(&self) -> &'static [(&'static str, FinishReason)] {
        FINISH_REASONS
    }
}
