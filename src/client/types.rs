use crate::types::events::CanonicalDelta;
use crate::{BoxStream, Result};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// How thinking content reaches the plain-text stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingRender {
    /// Wrap thinking in `<thinking>` / `</thinking>` markers inside the text.
    #[default]
    Inline,
    /// Drop thinking content.
    Omit,
}

impl ThinkingRender {
    /// Visible text for one delta: rendered thinking followed by content.
    pub fn render(&self, delta: &CanonicalDelta) -> Option<String> {
        let thinking = match self {
            ThinkingRender::Inline => delta.thinking.as_ref().map(|t| t.render_inline()),
            ThinkingRender::Omit => None,
        };
        match (thinking, delta.content.as_deref()) {
            (None, None) => None,
            (Some(t), None) => Some(t),
            (None, Some(c)) => Some(c.to_string()),
            (Some(t), Some(c)) => Some(t + c),
        }
    }
}

/// Ends a [`ControlledStream`] early.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] leaves the
/// stream running.
#[derive(Debug)]
pub struct CancelHandle {
    tx: oneshot::Sender<()>,
}

impl CancelHandle {
    pub fn cancel(self) {
        let _ = self.tx.send(());
    }
}

pub(crate) fn cancel_pair() -> (CancelHandle, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    (CancelHandle { tx }, rx)
}

/// Stream wrapper that stops cleanly on cancel and after the first error.
///
/// The inner stream (and with it the HTTP body) is dropped as soon as the
/// sequence ends for any reason.
pub struct ControlledStream<T> {
    inner: Option<BoxStream<'static, T>>,
    cancel_rx: Option<oneshot::Receiver<()>>,
}

impl<T> ControlledStream<T> {
    pub fn new(inner: BoxStream<'static, T>, cancel_rx: Option<oneshot::Receiver<()>>) -> Self {
        Self {
            inner: Some(inner),
            cancel_rx,
        }
    }

    fn close(&mut self) {
        self.inner = None;
        self.cancel_rx = None;
    }
}

impl<T> Stream for ControlledStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(rx) = this.cancel_rx.as_mut() {
            match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(())) => {
                    tracing::debug!("stream cancelled by caller");
                    this.close();
                    return Poll::Ready(None);
                }
                // Handle dropped without cancelling.
                Poll::Ready(Err(_)) => this.cancel_rx = None,
                Poll::Pending => {}
            }
        }

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.close();
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}
