//! Feature-error classification for vendor failures.
//!
//! Vendors report unsupported features (thinking, tools, images) as free-form
//! error text. This module maps that text, together with the HTTP status, to a
//! small closed set of codes that each carry an actionable hint.
//!
//! ## Example
//!
//! ```rust
//! use hchat_rust::error_code::FeatureErrorCode;
//!
//! let code = FeatureErrorCode::classify("gemini", 400, "Function declarations cannot be empty");
//! assert_eq!(code, Some(FeatureErrorCode::ToolsNotSupported));
//! assert_eq!(code.unwrap().code(), "TOOLS_NOT_SUPPORTED");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified reason a vendor rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureErrorCode {
    ThinkingNotSupported,
    ToolsNotSupported,
    InvalidToolName,
    InvalidToolSchema,
    InvalidImageFormat,
    ImageTooLarge,
    TokenLimitExceeded,
    RequestTooLarge,
    ContentBlocked,
    InvalidApiKey,
    InsufficientCredit,
    RegionUnavailable,
}

impl FeatureErrorCode {
    /// Stable code string (e.g., `"THINKING_NOT_SUPPORTED"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ThinkingNotSupported => "THINKING_NOT_SUPPORTED",
            Self::ToolsNotSupported => "TOOLS_NOT_SUPPORTED",
            Self::InvalidToolName => "INVALID_TOOL_NAME",
            Self::InvalidToolSchema => "INVALID_TOOL_SCHEMA",
            Self::InvalidImageFormat => "INVALID_IMAGE_FORMAT",
            Self::ImageTooLarge => "IMAGE_TOO_LARGE",
            Self::TokenLimitExceeded => "TOKEN_LIMIT_EXCEEDED",
            Self::RequestTooLarge => "REQUEST_TOO_LARGE",
            Self::ContentBlocked => "CONTENT_BLOCKED",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::InsufficientCredit => "INSUFFICIENT_CREDIT",
            Self::RegionUnavailable => "REGION_UNAVAILABLE",
        }
    }

    /// The request feature the failure relates to.
    #[inline]
    pub fn feature(&self) -> &'static str {
        match self {
            Self::ThinkingNotSupported => "thinking",
            Self::ToolsNotSupported | Self::InvalidToolName | Self::InvalidToolSchema => "tools",
            Self::InvalidImageFormat | Self::ImageTooLarge => "vision",
            Self::ContentBlocked => "safety",
            Self::InvalidApiKey => "auth",
            Self::TokenLimitExceeded
            | Self::RequestTooLarge
            | Self::InsufficientCredit
            | Self::RegionUnavailable => "general",
        }
    }

    /// Suggested next step for the caller.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::ThinkingNotSupported => {
                "Use a Claude model (claude-sonnet-4, claude-opus-4) or set thinking to false."
            }
            Self::ToolsNotSupported => {
                "Use a GPT-4 (gpt-4, gpt-4o) or Claude model, or remove the tools."
            }
            Self::InvalidToolName => {
                "Tool names may only contain ASCII letters, digits and underscores."
            }
            Self::InvalidToolSchema => {
                "Check that each tool's parameters are a valid JSON Schema object."
            }
            Self::InvalidImageFormat => "Use JPEG, PNG, GIF or WebP images.",
            Self::ImageTooLarge => "Reduce the image size before sending it.",
            Self::TokenLimitExceeded => "Lower max_tokens or shorten the input messages.",
            Self::RequestTooLarge => "The request body is too large; send fewer or shorter messages.",
            Self::ContentBlocked => "The vendor safety policy blocked this content; rephrase the request.",
            Self::InvalidApiKey => "Check that the configured API key is correct.",
            Self::InsufficientCredit => "The account is out of API credit.",
            Self::RegionUnavailable => "This vendor is not available from the current region.",
        }
    }

    /// Classify a failed exchange by provider name, HTTP status and body text.
    ///
    /// Returns `None` when nothing matched; the caller keeps the raw message.
    pub fn classify(provider: &str, status: u16, body: &str) -> Option<Self> {
        let msg = body.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

        if has(&["thinking blocks are not supported"]) {
            return Some(Self::ThinkingNotSupported);
        }
        if has(&["tools are not supported"]) {
            return Some(Self::ToolsNotSupported);
        }

        match provider {
            "claude" => {
                if has(&["tools.0.name"]) {
                    Some(Self::InvalidToolName)
                } else if has(&["invalid tool", "tool schema"]) {
                    Some(Self::InvalidToolSchema)
                } else if has(&["image format", "unsupported image"]) {
                    Some(Self::InvalidImageFormat)
                } else if has(&["max_tokens", "token limit"]) {
                    Some(Self::TokenLimitExceeded)
                } else if status == 400 && has(&["credit"]) {
                    Some(Self::InsufficientCredit)
                } else if status == 413 {
                    Some(Self::RequestTooLarge)
                } else {
                    None
                }
            }
            "gemini" => {
                if has(&["function declarations cannot be empty"]) {
                    Some(Self::ToolsNotSupported)
                } else if has(&["thinking is not supported", "thinking_mode"]) {
                    Some(Self::ThinkingNotSupported)
                } else if has(&["safety", "blocked"]) {
                    Some(Self::ContentBlocked)
                } else if has(&["image size", "too large"]) {
                    Some(Self::ImageTooLarge)
                } else if has(&["token limit", "max_output_tokens"]) {
                    Some(Self::TokenLimitExceeded)
                } else if status == 401 || has(&["api key not valid"]) {
                    Some(Self::InvalidApiKey)
                } else if status == 403 && has(&["location"]) {
                    Some(Self::RegionUnavailable)
                } else {
                    None
                }
            }
            "openai" => {
                if has(&["thinking"]) {
                    Some(Self::ThinkingNotSupported)
                } else if has(&["invalid tool", "tool_calls"]) {
                    Some(Self::InvalidToolSchema)
                } else if has(&["image too large", "image_size"]) {
                    Some(Self::ImageTooLarge)
                } else if status == 401 {
                    Some(Self::InvalidApiKey)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for FeatureErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
