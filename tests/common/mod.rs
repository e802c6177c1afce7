//! Shared fixtures: a scripted in-process transport.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use hchat_rust::drivers::DriverRequest;
use hchat_rust::transport::{Transport, TransportError};
use hchat_rust::{BoxStream, ClientConfig, Error, HChatClient, HChatClientBuilder, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Replays a fixed SSE body (or JSON body) and records every request it sees.
#[derive(Default)]
pub struct MockTransport {
    chunks: Vec<String>,
    json: Option<Value>,
    failure: Option<(String, u16, String)>,
    tail_error: Option<String>,
    dropped: Arc<AtomicBool>,
    requests: Mutex<Vec<DriverRequest>>,
}

impl MockTransport {
    pub fn sse(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    /// One `data:` event per payload, terminated with `[DONE]`.
    pub fn events(payloads: &[Value]) -> Self {
        let mut chunks: Vec<String> = payloads.iter().map(|p| format!("data: {}\n\n", p)).collect();
        chunks.push("data: [DONE]\n\n".to_string());
        Self {
            chunks,
            ..Default::default()
        }
    }

    pub fn json(body: Value) -> Self {
        Self {
            json: Some(body),
            ..Default::default()
        }
    }

    pub fn failing(provider: &str, status: u16, body: &str) -> Self {
        Self {
            failure: Some((provider.to_string(), status, body.to_string())),
            ..Default::default()
        }
    }

    /// Fail the body with a transport error after the scripted chunks.
    pub fn with_tail_error(mut self, message: &str) -> Self {
        self.tail_error = Some(message.to_string());
        self
    }

    pub fn body_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DriverRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: &DriverRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.failure {
            Some((provider, status, body)) => Err(Error::remote(provider.clone(), *status, body.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open_stream(&self, request: &DriverRequest) -> Result<BoxStream<'static, Bytes>> {
        self.record(request)?;

        let guard = DropFlag(self.dropped.clone());
        let mut items: Vec<Result<Bytes>> = self
            .chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.clone())))
            .collect();
        if let Some(msg) = &self.tail_error {
            items.push(Err(Error::Transport(TransportError::Other(msg.clone()))));
        }

        Ok(Box::pin(futures::stream::iter(items).map(move |item| {
            let _held = &guard;
            item
        })))
    }

    async fn send_json(&self, request: &DriverRequest) -> Result<Value> {
        self.record(request)?;
        self.json
            .clone()
            .ok_or_else(|| Error::Transport(TransportError::Other("no JSON body scripted".into())))
    }
}

pub fn client_with(transport: Arc<MockTransport>) -> HChatClient {
    builder_with(transport).build().unwrap()
}

pub fn builder_with(transport: Arc<MockTransport>) -> HChatClientBuilder {
    HChatClientBuilder::new()
        .config(ClientConfig::new("test-key").with_base_url("https://gateway.test/v2/api"))
        .transport(transport)
}
