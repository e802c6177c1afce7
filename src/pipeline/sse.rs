//! Server-sent event framing.
//!
//! [`Utf8FrameReader`] turns arbitrary byte chunks into text without ever splitting a
//! multi-byte character, and [`SseEventAssembler`] turns that text into complete
//! [`SseEvent`] records. Both are synchronous; the async plumbing lives in
//! [`super::decode`].
//!
//! Framing rules:
//! - events are separated by a blank line; `\r\n`, `\r` and `\n` all end a line
//! - lines starting with `:` are comments
//! - lines without a `:` are ignored
//! - the field name is everything before the first `:`; the value is the left-trimmed rest
//! - repeated `data:` lines are joined with `\n`
//! - a block without any `data:` line produces no event
//! - a `retry:` value that is not an integer is ignored

use super::PipelineError;

/// Largest amount of undelimited text the assembler buffers before giving up.
pub const DEFAULT_MAX_BUFFER: usize = 8 * 1024 * 1024;

/// One parsed event block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// `[DONE]` or `DONE` as the whole data value.
    pub fn is_sentinel(&self) -> bool {
        matches!(self.data.trim(), "[DONE]" | "DONE")
    }
}

/// Incremental UTF-8 decoder that holds back an incomplete trailing sequence.
///
/// Invalid sequences decode to U+FFFD; they never fail the stream.
#[derive(Debug, Default)]
pub struct Utf8FrameReader {
    pending: Vec<u8>,
}

impl Utf8FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending ++ bytes` as forms complete characters.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(s) => {
                    out.push_str(s);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.pending[start..valid_end]) {
                        out.push_str(valid);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + bad;
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        out
    }

    /// Flush whatever is left at end of input.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }
}

/// Buffers decoded text and yields complete events in arrival order.
#[derive(Debug)]
pub struct SseEventAssembler {
    buf: String,
    max_buffer: usize,
    /// A trailing `\r` may be the first half of a CRLF split across fragments.
    pending_cr: bool,
}

impl Default for SseEventAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl SseEventAssembler {
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buf: String::new(),
            max_buffer,
            pending_cr: false,
        }
    }

    /// Append a text fragment and return every event it completed.
    pub fn push(&mut self, text: &str) -> Result<Vec<SseEvent>, PipelineError> {
        self.append_normalized(text);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.buf[consumed..].find("\n\n") {
            let block = &self.buf[consumed..consumed + pos];
            if let Some(ev) = parse_block(block) {
                events.push(ev);
            }
            consumed += pos + 2;
        }
        self.buf.drain(..consumed);

        if self.buf.len() > self.max_buffer {
            return Err(PipelineError::EventTooLarge {
                limit: self.max_buffer,
                hint: None,
            }
            .with_hint("the upstream is not sending blank-line event separators"));
        }
        Ok(events)
    }

    /// Flush remaining text at end of stream, terminator or not.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if std::mem::take(&mut self.pending_cr) {
            self.buf.push('\n');
        }
        let rest = std::mem::take(&mut self.buf);
        rest.split("\n\n").filter_map(parse_block).collect()
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// CRLF, CR and LF all end a line; only the new fragment is rewritten.
    fn append_normalized(&mut self, text: &str) {
        self.buf.reserve(text.len());
        for c in text.chars() {
            if std::mem::take(&mut self.pending_cr) {
                self.buf.push('\n');
                if c == '\n' {
                    continue;
                }
            }
            if c == '\r' {
                self.pending_cr = true;
            } else {
                self.buf.push(c);
            }
        }
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    if block.trim().is_empty() {
        return None;
    }

    let mut event = SseEvent::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(':') {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim_start();
        match field {
            "event" => event.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => event.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.trim().parse::<u64>() {
                    event.retry = Some(ms);
                }
            }
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    event.data = data_lines.join("\n");
    Some(event)
}
