use crate::config::{ClientConfig, DEFAULT_STREAM_IDLE_SECS, DEFAULT_TIMEOUT_SECS};
use crate::drivers::{error_message, DriverRequest};
use crate::transport::{Transport, TransportError};
use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Proxy;
use std::env;
use std::pin::Pin;
use std::time::Duration;

type RawBody = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// reqwest-backed transport shared by every driver.
///
/// `timeout` bounds a whole non-streaming call, and only the wait for response
/// headers of a streaming one. Stream bodies are bounded by the gap between
/// chunks instead.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
    stream_idle_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(
                env::var("AI_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(ref proxy_url) = config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(http_error)?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.without_url().to_string())))?;

        Ok(Self {
            client,
            timeout: config.timeout,
            stream_idle_timeout: config.stream_idle_timeout,
        })
    }

    /// Wrap an existing client (custom TLS, middleware, tests).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stream_idle_timeout: Duration::from_secs(DEFAULT_STREAM_IDLE_SECS),
        }
    }

    async fn send(&self, request: &DriverRequest) -> Result<reqwest::Response> {
        let mut req = match request.method.to_uppercase().as_str() {
            "GET" => self.client.get(&request.url),
            _ => self.client.post(&request.url).json(&request.body),
        };
        for (k, v) in &request.headers {
            req = req.header(k, v);
        }

        let provider = request.provider.id();
        let sent = if request.stream {
            req = req.header("accept", "text/event-stream");
            match tokio::time::timeout(self.timeout, req.send()).await {
                Ok(sent) => sent,
                Err(_) => {
                    tracing::warn!(provider, timeout = ?self.timeout, "no response headers before the deadline");
                    return Err(Error::Transport(TransportError::Other(format!(
                        "no response within {:?}",
                        self.timeout
                    ))));
                }
            }
        } else {
            req.timeout(self.timeout).send().await
        };

        let response = sent.map_err(|e| {
            let err = http_error(e);
            tracing::warn!(provider, error = %err, "request failed before a response arrived");
            err
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(provider, http_status = status.as_u16(), stream = request.stream, "vendor request accepted");
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("error").map(error_message))
            .unwrap_or(text);
        tracing::warn!(provider, http_status = status.as_u16(), message = %message, "vendor rejected request");
        Err(Error::remote(provider, status.as_u16(), message))
    }
}

/// Wrap a reqwest error without its URL; Gemini carries the API key in the query.
fn http_error(e: reqwest::Error) -> Error {
    Error::Transport(TransportError::Http(e.without_url()))
}

/// Body chunks until the upstream ends, fails, or stays silent longer than `idle`.
fn idle_guarded(body: RawBody, idle: Duration, provider: &'static str) -> BoxStream<'static, Bytes> {
    Box::pin(futures::stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
            Ok(Some(Err(e))) => {
                let err = http_error(e);
                tracing::warn!(provider, error = %err, "stream body failed");
                Some((Err(err), None))
            }
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(provider, idle = ?idle, "stream went silent");
                let err = TransportError::Other(format!("no stream data for {:?}", idle));
                Some((Err(Error::Transport(err)), None))
            }
        }
    }))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open_stream(&self, request: &DriverRequest) -> Result<BoxStream<'static, Bytes>> {
        let resp = self.send(request).await?;
        let body: RawBody = Box::pin(resp.bytes_stream());
        Ok(idle_guarded(body, self.stream_idle_timeout, request.provider.id()))
    }

    async fn send_json(&self, request: &DriverRequest) -> Result<serde_json::Value> {
        let resp = self.send(request).await?;
        resp.json().await.map_err(http_error)
    }
}
