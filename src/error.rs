use crate::error_code::FeatureErrorCode;
use crate::pipeline::PipelineError;
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.base_url", "request.messages[0].content")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "claude_driver")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the chat client.
///
/// Callers of a stream see at most one of these, and it always ends iteration.
/// A malformed payload inside an otherwise healthy stream is never surfaced here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Pipeline processing error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Unknown model provider for: {model}")]
    UnknownModel { model: String },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    /// Non-2xx status before any streamed byte was delivered.
    #[error("{provider} API error ({status}): {message}{}", .hint.as_ref().map(|h| format!("\n💡 Hint: {}", h)).unwrap_or_default())]
    Remote {
        provider: String,
        status: u16,
        message: String,
        code: Option<FeatureErrorCode>,
        hint: Option<String>,
    },

    /// Vendor error payload received after streaming started.
    #[error("{provider} stream error: {message}")]
    Stream { provider: String, message: String },

    /// A 2xx body that carries an error or lacks the expected shape.
    #[error("{provider} returned an unusable response: {message}")]
    Response { provider: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Build a remote error from a failed HTTP exchange, classifying the body on the way.
    pub fn remote(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = body.into();
        let code = FeatureErrorCode::classify(&provider, status, &message);
        Error::Remote {
            hint: code.map(|c| c.hint().to_string()),
            provider,
            status,
            message,
            code,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Validation { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// HTTP status for errors that originate from a vendor response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            Error::Transport(TransportError::Http(e)) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Feature-error classification, when the vendor body matched a known pattern.
    pub fn feature_code(&self) -> Option<FeatureErrorCode> {
        match self {
            Error::Remote { code, .. } => *code,
            _ => None,
        }
    }
}
