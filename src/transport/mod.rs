//! 传输层：负责把驱动构造好的请求发送给厂商网关。
//!
//! The [`Transport`] trait is the seam between the dispatcher and the network.
//! [`HttpTransport`] is the reqwest-backed implementation; tests inject their own.
//!
//! A transport must turn a non-2xx status into [`crate::Error::Remote`] before any
//! body byte is handed out, so a failed call never starts a stream.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::drivers::DriverRequest;
use crate::{BoxStream, Result};

pub use http::HttpTransport;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a streaming request and return the response body as a byte stream.
    ///
    /// Dropping the returned stream releases the connection.
    async fn open_stream(&self, request: &DriverRequest) -> Result<BoxStream<'static, Bytes>>;

    /// Send a non-streaming request and return the parsed JSON body.
    async fn send_json(&self, request: &DriverRequest) -> Result<Value>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
