//! Model name → provider dispatch.

use crate::drivers::ProviderKind;
use crate::{Error, Result};
use once_cell::sync::Lazy;

/// One prefix rule. Prefixes are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub prefix: String,
    pub provider: ProviderKind,
}

impl RouteRule {
    pub fn new(prefix: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            prefix: prefix.into().to_lowercase(),
            provider,
        }
    }
}

static DEFAULT_RULES: Lazy<Vec<RouteRule>> = Lazy::new(|| {
    vec![
        RouteRule::new("gpt-", ProviderKind::OpenAi),
        RouteRule::new("claude-", ProviderKind::Claude),
        RouteRule::new("gemini-", ProviderKind::Gemini),
    ]
});

/// Ordered prefix table. The first matching rule wins; no match is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRouter {
    rules: Vec<RouteRule>,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl ModelRouter {
    /// A router with no rules; every model is unknown until rules are added.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule that takes precedence over every existing rule.
    pub fn prepend(mut self, prefix: impl Into<String>, provider: ProviderKind) -> Self {
        self.rules.insert(0, RouteRule::new(prefix, provider));
        self
    }

    /// Add a rule consulted after every existing rule.
    pub fn append(mut self, prefix: impl Into<String>, provider: ProviderKind) -> Self {
        self.rules.push(RouteRule::new(prefix, provider));
        self
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Case-insensitive prefix match.
    pub fn resolve(&self, model: &str) -> Result<ProviderKind> {
        let lower = model.to_lowercase();
        self.rules
            .iter()
            .find(|r| lower.starts_with(&r.prefix))
            .map(|r| r.provider)
            .ok_or_else(|| Error::UnknownModel {
                model: model.to_string(),
            })
    }
}
