use crate::client::routing::ModelRouter;
use crate::client::types::{cancel_pair, CancelHandle, ControlledStream, ThinkingRender};
use crate::config::ClientConfig;
use crate::drivers::{create_driver, now_secs, DriverRequest, ProviderDriver, ProviderKind};
use crate::pipeline::Pipeline;
use crate::telemetry::{DeltaEvent, DeltaSink};
use crate::transport::Transport;
use crate::types::events::{CanonicalDelta, FinishReason, StreamChunk, ThinkingMarker};
use crate::types::request::ChatRequest;
use crate::types::response::{ChatCompletion, ResponseMessage};
use crate::utils::ToolCallAssembler;
use crate::{BoxStream, Error, ErrorContext, Result};
use futures::StreamExt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Multi-vendor chat client.
///
/// Every streaming call opens a new connection and starts from a fresh adapter
/// state, so one client can drive any number of concurrent streams.
pub struct HChatClient {
    pub(crate) config: ClientConfig,
    pub(crate) router: ModelRouter,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) sink: Arc<dyn DeltaSink>,
    pub(crate) render: ThinkingRender,
}

impl std::fmt::Debug for HChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HChatClient")
            .field("base_url", &self.config.base_url)
            .field("router", &self.router)
            .field("render", &self.render)
            .finish_non_exhaustive()
    }
}

impl HChatClient {
    /// Client with an explicit API key; everything else from the environment.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        crate::client::builder::HChatClientBuilder::new()
            .api_key(api_key)
            .build()
    }

    /// Client configured entirely from the environment.
    pub fn from_env() -> Result<Self> {
        crate::client::builder::HChatClientBuilder::new().build()
    }

    pub fn builder() -> crate::client::builder::HChatClientBuilder {
        crate::client::builder::HChatClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Provider that would serve `model`.
    pub fn provider_for(&self, model: &str) -> Result<ProviderKind> {
        self.router.resolve(model)
    }

    fn prepare(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<(Arc<dyn ProviderDriver>, DriverRequest)> {
        if request.messages.is_empty() {
            return Err(Error::validation_with_context(
                "request has no messages",
                ErrorContext::new()
                    .with_field_path("request.messages")
                    .with_source("hchat_client"),
            ));
        }

        let kind = self.router.resolve(&request.model)?;
        let driver = create_driver(kind);
        let driver_request =
            driver.build_request(request, &self.config.base_url, self.config.api_key(), stream)?;

        if self.config.debug {
            // The query may hold the API key.
            let url = driver_request
                .url
                .split_once('?')
                .map_or(driver_request.url.as_str(), |(path, _)| path);
            tracing::debug!(
                provider = %kind,
                model = %request.model,
                url = %url,
                body = %driver_request.body,
                "vendor request"
            );
        }
        Ok((driver, driver_request))
    }

    /// Canonical deltas in wire order, every field intact.
    ///
    /// A transport failure is returned here, before any item; a vendor error
    /// inside the stream is yielded once and ends the sequence.
    pub async fn stream_deltas(&self, request: &ChatRequest) -> Result<BoxStream<'static, CanonicalDelta>> {
        let (driver, driver_request) = self.prepare(request, true)?;
        let provider = driver.kind();
        let model = request.model.clone();

        let body = self.transport.open_stream(&driver_request).await?;
        info!(provider = %provider, model = %model, "stream opened");

        let pipeline = Pipeline::for_driver(driver, model.clone());
        let deltas = pipeline.process_stream(body).await?;

        let stream_id = Uuid::new_v4().simple().to_string();
        let sink = self.sink.clone();
        let observed = deltas.then(move |item| {
            let sink = sink.clone();
            let stream_id = stream_id.clone();
            let model = model.clone();
            async move {
                let event = match &item {
                    Ok(delta) => Some(DeltaEvent::new(stream_id, provider, model, delta.clone())),
                    Err(e) => {
                        tracing::warn!(provider = %provider, model = %model, error = %e, "stream ended with error");
                        None
                    }
                };
                if let Some(event) = event {
                    if let Err(e) = sink.observe(event).await {
                        tracing::debug!(error = %e, "delta sink failed");
                    }
                }
                item
            }
        });

        Ok(Box::pin(ControlledStream::new(Box::pin(observed), None)))
    }

    /// Plain-text stream plus a handle that ends it early.
    ///
    /// Only visible text is yielded: content, and thinking when rendered inline.
    /// Tool-call fragments reach the configured [`DeltaSink`] only.
    pub async fn stream_with_cancel(
        &self,
        request: &ChatRequest,
    ) -> Result<(BoxStream<'static, String>, CancelHandle)> {
        let deltas = self.stream_deltas(request).await?;
        let render = self.render;
        let text = deltas.filter_map(move |item| {
            let out = match item {
                Ok(delta) => render
                    .render(&delta)
                    .filter(|s| !s.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(e)),
            };
            futures::future::ready(out)
        });

        let (handle, rx) = cancel_pair();
        Ok((Box::pin(ControlledStream::new(Box::pin(text), Some(rx))), handle))
    }

    /// Plain-text stream. Stop early by dropping it.
    pub async fn stream(&self, request: &ChatRequest) -> Result<BoxStream<'static, String>> {
        let (stream, _handle) = self.stream_with_cancel(request).await?;
        Ok(stream)
    }

    /// Stream in the `chat.completion.chunk` shape, one chunk per delta.
    ///
    /// Every chunk of one stream shares the same id.
    pub async fn stream_chunks(&self, request: &ChatRequest) -> Result<BoxStream<'static, StreamChunk>> {
        let deltas = self.stream_deltas(request).await?;
        let id = format!("chatcmpl-{}", Uuid::new_v4().simple());
        let model = request.model.clone();
        let render = self.render;
        let chunks = deltas.map(move |item| {
            item.map(|delta| {
                let content = render.render(&delta);
                StreamChunk::from_delta(id.clone(), model.clone(), now_secs(), content, &delta)
            })
        });
        Ok(Box::pin(chunks))
    }

    /// Non-streaming completion.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let (driver, driver_request) = self.prepare(request, false)?;
        let body = self.transport.send_json(&driver_request).await?;
        if self.config.debug {
            tracing::debug!(provider = %driver.kind(), model = %request.model, body = %body, "vendor response");
        }
        let completion = driver.parse_response(&body, &request.model)?;
        info!(
            provider = %driver.kind(),
            model = %completion.model,
            finish_reason = ?completion.finish_reason(),
            "completion received"
        );
        Ok(completion)
    }

    /// Stream a request and fold it into one completion.
    ///
    /// Thinking text is collected without markers. The last finish reason seen
    /// wins; a stream that ends without one reports `stop`.
    pub async fn collect(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let mut deltas = self.stream_deltas(request).await?;

        let mut content = String::new();
        let mut thinking = String::new();
        let mut tools = ToolCallAssembler::new();
        let mut finish: Option<FinishReason> = None;

        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            if let Some(text) = delta.content.as_deref() {
                content.push_str(text);
            }
            if let Some(t) = &delta.thinking {
                let opens = matches!(t.marker, ThinkingMarker::Open | ThinkingMarker::Block);
                if opens && !thinking.is_empty() {
                    thinking.push('\n');
                }
                thinking.push_str(&t.text);
            }
            tools.extend(&delta.tool_calls);
            if delta.finish_reason.is_some() {
                finish = delta.finish_reason;
            }
        }

        let message = ResponseMessage::assistant(
            Some(content),
            (!thinking.is_empty()).then_some(thinking),
            tools.finalize(),
        );
        Ok(ChatCompletion::single(
            format!("chatcmpl-{}", Uuid::new_v4().simple()),
            request.model.clone(),
            now_secs(),
            message,
            Some(finish.unwrap_or(FinishReason::Stop)),
            None,
        ))
    }
}
