use crate::client::core::HChatClient;
use crate::client::routing::ModelRouter;
use crate::client::types::ThinkingRender;
use crate::config::ClientConfig;
use crate::telemetry::DeltaSink;
use crate::transport::{HttpTransport, Transport};
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`HChatClient`].
///
/// Settings resolve as: explicit [`config`](Self::config) or config file, else
/// defaults plus environment; then every individual setter on top.
pub struct HChatClientBuilder {
    config: Option<ClientConfig>,
    config_path: Option<PathBuf>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    proxy_url: Option<String>,
    debug: Option<bool>,
    router: ModelRouter,
    transport: Option<Arc<dyn Transport>>,
    sink: Arc<dyn DeltaSink>,
    render: ThinkingRender,
}

impl HChatClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            config_path: None,
            api_key: None,
            base_url: None,
            timeout: None,
            proxy_url: None,
            debug: None,
            router: ModelRouter::default(),
            transport: None,
            sink: crate::telemetry::noop_sink(),
            render: ThinkingRender::default(),
        }
    }

    /// Start from a complete configuration instead of the environment.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load a YAML config file at build time (environment still applies on top).
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the gateway base URL (also used to point at mock servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn debug(mut self, enable: bool) -> Self {
        self.debug = Some(enable);
        self
    }

    /// Replace the model-prefix routing table.
    pub fn router(mut self, router: ModelRouter) -> Self {
        self.router = router;
        self
    }

    /// Inject a transport. Default is [`HttpTransport`] built from the config.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Inject a delta sink. Default is a no-op sink.
    pub fn delta_sink(mut self, sink: Arc<dyn DeltaSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn thinking_render(mut self, render: ThinkingRender) -> Self {
        self.render = render;
        self
    }

    pub fn build(self) -> Result<HChatClient> {
        let mut config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => ClientConfig::load(path)?,
            (None, None) => ClientConfig::from_env(),
        };

        if let Some(key) = self.api_key {
            config.api_key = Some(key);
        }
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(proxy) = self.proxy_url {
            config.proxy_url = Some(proxy);
        }
        if let Some(debug) = self.debug {
            config.debug = debug;
        }
        config.validate()?;

        if !config.has_api_key() {
            tracing::warn!("no API key configured; requests will be sent without credentials");
        }

        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config)?),
        };

        Ok(HChatClient {
            config,
            router: self.router,
            transport,
            sink: self.sink,
            render: self.render,
        })
    }
}

impl Default for HChatClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
