//! Canonical streaming deltas and the public chunk schema

use serde::{Deserialize, Serialize};

/// Canonical finish reason. Every vendor-native reason maps onto exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::ContentFilter => "content_filter",
        }
    }

    /// Look `native` up in a vendor table; unknown reasons resolve to `Stop`.
    pub fn from_table(table: &[(&str, FinishReason)], native: &str) -> FinishReason {
        table
            .iter()
            .find(|(name, _)| *name == native)
            .map(|(_, reason)| *reason)
            .unwrap_or(FinishReason::Stop)
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a piece of thinking content sits relative to its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingMarker {
    /// First fragment of a streamed block.
    Open,
    /// Continuation fragment inside an open block.
    Text,
    /// The block ended; carries no text.
    Close,
    /// A whole block delivered at once.
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingDelta {
    pub marker: ThinkingMarker,
    #[serde(default)]
    pub text: String,
}

impl ThinkingDelta {
    pub fn new(marker: ThinkingMarker, text: impl Into<String>) -> Self {
        Self {
            marker,
            text: text.into(),
        }
    }

    /// Text-channel rendering with literal `<thinking>` markers.
    pub fn render_inline(&self) -> String {
        match self.marker {
            ThinkingMarker::Open => format!("<thinking>{}", self.text),
            ThinkingMarker::Text => self.text.clone(),
            ThinkingMarker::Close => "</thinking>\n".to_string(),
            ThinkingMarker::Block => format!("\n<thinking>\n{}\n</thinking>\n", self.text),
        }
    }
}

/// One slice of a tool call. Fragments sharing an `index` concatenate into one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments_chunk: Option<String>,
}

impl ToolCallFragment {
    /// Opening fragment: id and name, empty arguments.
    pub fn start(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments_chunk: Some(String::new()),
        }
    }

    pub fn arguments(index: u32, chunk: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            name: None,
            arguments_chunk: Some(chunk.into()),
        }
    }
}

/// One incremental unit of model output, vendor-neutral.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingDelta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl CanonicalDelta {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn thinking(marker: ThinkingMarker, text: impl Into<String>) -> Self {
        Self {
            thinking: Some(ThinkingDelta::new(marker, text)),
            ..Default::default()
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Default::default()
        }
    }

    pub fn finish(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Default::default()
        }
    }

    pub fn with_finish_reason(mut self, reason: Option<FinishReason>) -> Self {
        self.finish_reason = reason;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.thinking.is_none()
            && self.tool_calls.is_empty()
            && self.finish_reason.is_none()
    }
}

/// Public chunk shape, one per emitted delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub id: String,
    pub object: String,
    /// Epoch seconds.
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
}

impl StreamChunk {
    pub const OBJECT: &'static str = "chat.completion.chunk";

    /// Project a delta into the chunk schema. `content` is the already rendered text.
    pub fn from_delta(
        id: impl Into<String>,
        model: impl Into<String>,
        created: u64,
        content: Option<String>,
        delta: &CanonicalDelta,
    ) -> Self {
        let tool_calls = if delta.tool_calls.is_empty() {
            None
        } else {
            Some(delta.tool_calls.clone())
        };
        Self {
            id: id.into(),
            object: Self::OBJECT.to_string(),
            created,
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content,
                    tool_calls,
                },
                finish_reason: delta.finish_reason,
            }],
        }
    }
}
