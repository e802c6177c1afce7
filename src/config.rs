//! 客户端配置：API 密钥、网关地址、超时与代理。
//!
//! Client configuration.
//!
//! Values are resolved in layers: built-in defaults, then an optional YAML file,
//! then environment variables. Later layers override earlier ones field by field.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HCHAT_API_KEY` | `api_key` |
//! | `HCHAT_BASE_URL` | `base_url` |
//! | `AI_HTTP_TIMEOUT_SECS` | `timeout` |
//! | `AI_HTTP_STREAM_IDLE_SECS` | `stream_idle_timeout` |
//! | `AI_PROXY_URL` | `proxy_url` |
//! | `HCHAT_DEBUG` | `debug` |

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://h-chat-api.autoever.com/v2/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STREAM_IDLE_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
    /// Longest gap between two body chunks of a stream. A stream as a whole has no deadline.
    #[serde(rename = "stream_idle_timeout_secs", with = "duration_secs")]
    pub stream_idle_timeout: Duration,
    pub proxy_url: Option<String>,
    /// Log raw request bodies and every decoded payload at debug level.
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stream_idle_timeout: Duration::from_secs(DEFAULT_STREAM_IDLE_SECS),
            proxy_url: None,
            debug: false,
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stream_idle_timeout(mut self, idle: Duration) -> Self {
        self.stream_idle_timeout = idle;
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::default().merge_env(|k| std::env::var(k).ok())
    }

    /// Load a YAML file, then overlay the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text).map_err(|e| match e {
            Error::Configuration { message, context } => Error::configuration_with_context(
                message,
                context.with_field_path(path.display().to_string()),
            ),
            other => other,
        })?;
        Ok(config.merge_env(|k| std::env::var(k).ok()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid config file: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })
    }

    /// Overlay values from a variable lookup. Unparseable numbers and booleans are ignored.
    pub fn merge_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("HCHAT_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("HCHAT_BASE_URL") {
            self.base_url = url;
        }
        if let Some(secs) = non_empty("AI_HTTP_TIMEOUT_SECS").and_then(|s| s.trim().parse::<u64>().ok()) {
            self.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = non_empty("AI_HTTP_STREAM_IDLE_SECS").and_then(|s| s.trim().parse::<u64>().ok()) {
            self.stream_idle_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(proxy) = non_empty("AI_PROXY_URL") {
            self.proxy_url = Some(proxy);
        }
        if let Some(debug) = non_empty("HCHAT_DEBUG") {
            self.debug = matches!(debug.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        self
    }

    /// Fail fast on a base URL that would only surface as a transport error later.
    ///
    /// The API key is sent as-is; an absent key is left for the gateway to reject.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("config.base_url")
                    .with_details(self.base_url.clone()),
            )
        })?;
        Ok(())
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert_eq!(cfg.stream_idle_timeout, Duration::from_secs(300));
        assert!(cfg.api_key.is_none());
        assert!(!cfg.debug);
    }

    #[test]
    fn test_yaml_fields_override_defaults() {
        let cfg = ClientConfig::from_yaml_str(
            "api_key: k-1\nbase_url: http://localhost:9000/api\ntimeout_secs: 5\n",
        )
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("k-1"));
        assert_eq!(cfg.base_url, "http://localhost:9000/api");
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert!(cfg.proxy_url.is_none());
    }

    #[test]
    fn test_invalid_yaml_is_configuration_error() {
        let err = ClientConfig::from_yaml_str("timeout_secs: soon").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_env_overrides_file() {
        let cfg = ClientConfig::from_yaml_str("api_key: from-file\n")
            .unwrap()
            .merge_env(env(&[
                ("HCHAT_API_KEY", "from-env"),
                ("AI_HTTP_TIMEOUT_SECS", "15"),
                ("AI_HTTP_STREAM_IDLE_SECS", "120"),
                ("AI_PROXY_URL", "http://proxy:3128"),
                ("HCHAT_DEBUG", "true"),
            ]));
        assert_eq!(cfg.api_key.as_deref(), Some("from-env"));
        assert_eq!(cfg.timeout, Duration::from_secs(15));
        assert_eq!(cfg.stream_idle_timeout, Duration::from_secs(120));
        assert_eq!(cfg.proxy_url.as_deref(), Some("http://proxy:3128"));
        assert!(cfg.debug);
    }

    #[test]
    fn test_bad_env_values_are_ignored() {
        let cfg = ClientConfig::default().merge_env(env(&[
            ("AI_HTTP_TIMEOUT_SECS", "ten"),
            ("HCHAT_API_KEY", "   "),
        ]));
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::default().validate().is_ok());

        let err = ClientConfig::new("k").with_base_url("not a url").validate().unwrap_err();
        assert!(err.to_string().contains("config.base_url"));

        assert!(ClientConfig::new("k").validate().is_ok());
    }
}
