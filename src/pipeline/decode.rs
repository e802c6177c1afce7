//! Streaming decoders (Bytes -> SseEvent -> JSON Value)
//!
//! The sentinel (`[DONE]` / `DONE`) ends the stream and drops the byte source, even
//! if more bytes would follow. A payload that is not valid JSON is logged and
//! skipped; it never ends the stream.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{stream, StreamExt};
use serde_json::Value;

use super::sse::{SseEvent, SseEventAssembler, Utf8FrameReader, DEFAULT_MAX_BUFFER};
use super::Decoder;
use crate::{BoxStream, PipeResult};

/// SSE decoder producing one JSON value per event.
#[derive(Debug, Clone)]
pub struct SseDecoder {
    max_buffer: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self { max_buffer }
    }
}

#[async_trait::async_trait]
impl Decoder for SseDecoder {
    async fn decode_stream(
        &self,
        input: BoxStream<'static, Bytes>,
    ) -> PipeResult<BoxStream<'static, Value>> {
        Ok(json_payloads(sse_events(input, self.max_buffer)))
    }
}

struct FrameState {
    // `None` once the body is exhausted or failed.
    input: Option<BoxStream<'static, Bytes>>,
    reader: Utf8FrameReader,
    assembler: SseEventAssembler,
    ready: VecDeque<SseEvent>,
}

/// Bytes → complete SSE events, in arrival order.
pub fn sse_events(input: BoxStream<'static, Bytes>, max_buffer: usize) -> BoxStream<'static, SseEvent> {
    let state = FrameState {
        input: Some(input),
        reader: Utf8FrameReader::new(),
        assembler: SseEventAssembler::with_max_buffer(max_buffer),
        ready: VecDeque::new(),
    };

    let stream = stream::unfold(state, |mut st| async move {
        loop {
            if let Some(ev) = st.ready.pop_front() {
                return Some((Ok(ev), st));
            }

            let input = st.input.as_mut()?;
            match input.next().await {
                Some(Ok(bytes)) => {
                    let text = st.reader.push(&bytes);
                    match st.assembler.push(&text) {
                        Ok(events) => st.ready.extend(events),
                        Err(e) => {
                            st.input = None;
                            return Some((Err(e.into()), st));
                        }
                    }
                }
                Some(Err(e)) => {
                    st.input = None;
                    return Some((Err(e), st));
                }
                None => {
                    st.input = None;
                    if let Some(rest) = st.reader.finish() {
                        if let Err(e) = st.assembler.push(&rest) {
                            return Some((Err(e.into()), st));
                        }
                    }
                    st.ready.extend(st.assembler.finish());
                }
            }
        }
    });

    Box::pin(stream)
}

/// SSE events → parsed JSON payloads, stopping at the sentinel.
pub fn json_payloads(events: BoxStream<'static, SseEvent>) -> BoxStream<'static, Value> {
    let stream = stream::unfold(events, |mut events| async move {
        loop {
            match events.next().await {
                Some(Ok(ev)) => {
                    if ev.is_sentinel() {
                        tracing::debug!("SSE stream reached termination sentinel");
                        return None;
                    }
                    match serde_json::from_str::<Value>(&ev.data) {
                        Ok(v) => return Some((Ok(v), events)),
                        Err(e) => {
                            tracing::debug!(data = %ev.data, error = %e, "skipping malformed SSE payload");
                            continue;
                        }
                    }
                }
                Some(Err(e)) => return Some((Err(e), events)),
                None => return None,
            }
        }
    });

    Box::pin(stream)
}
