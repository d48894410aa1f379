//! Chunked stream decoding.
//!
//! `streamGenerateContent` answers with a long-lived body that arrives in
//! arbitrary chunks. By default the body is one JSON array whose elements are
//! written progressively:
//!
//! ```text
//! [{"candidates": [...]}
//! ,{"candidates": [...]}
//! ]
//! ```
//!
//! With `alt=sse` the same values arrive as Server-Sent Events instead (see
//! [`crate::sse`]). Either way the decoders here turn the chunks back into one
//! [`StreamEvent`] per top-level value, in order, without waiting for the end
//! of the response.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{trace, warn};

use crate::client::{ClientError, DecodeError, TransportError};
use crate::sse::SseDecoder;

/// Wire convention used to delimit streamed values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FramingMode {
    /// Elements of a single top-level JSON array.
    #[default]
    JsonArray,
    /// `data:` lines of a Server-Sent-Events stream (`alt=sse`).
    Sse,
}

/// One decoded top-level JSON value from a response stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    raw: String,
    value: Value,
}

impl StreamEvent {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw = std::str::from_utf8(bytes)?.trim();
        let value = serde_json::from_str(raw).map_err(|source| DecodeError::Json {
            source,
            payload: raw.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            value,
        })
    }

    /// The value's text exactly as it appeared on the wire, trimmed.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Deserialize the value into a typed response, e.g.
    /// [`GenerateContentResponse`](crate::model::GenerateContentResponse).
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        T::deserialize(&self.value).map_err(|source| DecodeError::Json {
            source,
            payload: self.raw.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayPhase {
    /// Before the opening `[`.
    Opening,
    /// Between `[` and `]`.
    Elements,
    /// After the closing `]`.
    Closed,
}

/// Incremental decoder for the elements of a streamed JSON array.
///
/// Works on bytes: every structural character is ASCII, so a multi-byte
/// UTF-8 sequence split between chunks never confuses the scanner. An element
/// is emitted once the byte after it (`,` or `]`) is seen at array level.
#[derive(Debug)]
pub struct JsonArrayDecoder {
    phase: ArrayPhase,
    element: Vec<u8>,
    depth: usize,
    in_string: bool,
    escaped: bool,
    after_comma: bool,
    offset: usize,
    failed: bool,
}

impl Default for JsonArrayDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonArrayDecoder {
    pub fn new() -> Self {
        Self {
            phase: ArrayPhase::Opening,
            element: Vec::new(),
            depth: 0,
            in_string: false,
            escaped: false,
            after_comma: false,
            offset: 0,
            failed: false,
        }
    }

    /// Feed a chunk and collect every element it completes.
    ///
    /// An error is always the last item; the decoder ignores input after it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, DecodeError>> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.failed {
                break;
            }
            match self.step(byte) {
                Ok(Some(event)) => events.push(Ok(event)),
                Ok(None) => {}
                Err(e) => {
                    self.failed = true;
                    events.push(Err(e));
                }
            }
            self.offset += 1;
        }
        events
    }

    /// Signal end of input.
    ///
    /// Only a closed array, or input that never opened one, is a clean end.
    /// An array still open at EOF is truncated, even between elements.
    pub fn finish(&mut self) -> Vec<Result<StreamEvent, DecodeError>> {
        if self.failed || self.phase != ArrayPhase::Elements {
            return Vec::new();
        }
        self.failed = true;
        let pending = if is_blank(&self.element) {
            0
        } else {
            self.element.len()
        };
        vec![Err(DecodeError::Truncated { pending })]
    }

    fn step(&mut self, byte: u8) -> Result<Option<StreamEvent>, DecodeError> {
        match self.phase {
            ArrayPhase::Opening => match byte {
                b'[' => {
                    self.phase = ArrayPhase::Elements;
                    Ok(None)
                }
                b if b.is_ascii_whitespace() => Ok(None),
                _ => Err(self.unexpected(byte)),
            },
            ArrayPhase::Elements => self.step_element(byte),
            ArrayPhase::Closed if byte.is_ascii_whitespace() => Ok(None),
            ArrayPhase::Closed => Err(self.unexpected(byte)),
        }
    }

    fn step_element(&mut self, byte: u8) -> Result<Option<StreamEvent>, DecodeError> {
        if self.in_string {
            self.element.push(byte);
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return Ok(None);
        }

        match byte {
            b',' | b']' if self.depth == 0 => self.end_element(byte),
            b'{' | b'[' => {
                self.depth += 1;
                self.element.push(byte);
                Ok(None)
            }
            b'}' | b']' => {
                if self.depth == 0 {
                    return Err(self.unexpected(byte));
                }
                self.depth -= 1;
                self.element.push(byte);
                Ok(None)
            }
            b'"' => {
                self.in_string = true;
                self.element.push(byte);
                Ok(None)
            }
            b if b.is_ascii_whitespace() && self.element.is_empty() => Ok(None),
            _ => {
                self.element.push(byte);
                Ok(None)
            }
        }
    }

    fn end_element(&mut self, delimiter: u8) -> Result<Option<StreamEvent>, DecodeError> {
        let element = std::mem::take(&mut self.element);
        let after_comma = std::mem::replace(&mut self.after_comma, delimiter == b',');
        if delimiter == b']' {
            self.phase = ArrayPhase::Closed;
        }

        if is_blank(&element) {
            // `[]` is the only place an element may be missing.
            return if delimiter == b']' && !after_comma {
                Ok(None)
            } else {
                Err(self.unexpected(delimiter))
            };
        }
        StreamEvent::parse(&element).map(Some)
    }

    fn unexpected(&self, byte: u8) -> DecodeError {
        DecodeError::UnexpectedToken {
            found: char::from(byte),
            offset: self.offset,
        }
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// A decoder for either framing mode.
#[derive(Debug)]
pub enum StreamDecoder {
    JsonArray(JsonArrayDecoder),
    Sse(SseDecoder),
}

impl StreamDecoder {
    pub fn new(framing: FramingMode) -> Self {
        match framing {
            FramingMode::JsonArray => StreamDecoder::JsonArray(JsonArrayDecoder::new()),
            FramingMode::Sse => StreamDecoder::Sse(SseDecoder::new()),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, DecodeError>> {
        match self {
            StreamDecoder::JsonArray(decoder) => decoder.feed(chunk),
            StreamDecoder::Sse(decoder) => decoder.feed(chunk),
        }
    }

    pub fn finish(&mut self) -> Vec<Result<StreamEvent, DecodeError>> {
        match self {
            StreamDecoder::JsonArray(decoder) => decoder.finish(),
            StreamDecoder::Sse(decoder) => decoder.finish(),
        }
    }

    /// Whether the stream announced its own end, so no more chunks are needed.
    pub fn is_terminated(&self) -> bool {
        match self {
            StreamDecoder::JsonArray(_) => false,
            StreamDecoder::Sse(decoder) => decoder.is_done(),
        }
    }
}

/// Stream of decoded values as returned by the streaming operations.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send>>;

struct DecodeState<S> {
    chunks: Pin<Box<S>>,
    decoder: StreamDecoder,
    ready: VecDeque<Result<StreamEvent, DecodeError>>,
    done: bool,
}

/// Decode a stream of transport chunks into a stream of values.
///
/// Chunks are only pulled when the consumer asks for the next value and none
/// is buffered, so dropping the returned stream stops reading. The stream
/// ends after the first error; values yielded before it stand.
pub fn decode_stream<S>(
    chunks: S,
    framing: FramingMode,
) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
{
    let state = DecodeState {
        chunks: Box::pin(chunks),
        decoder: StreamDecoder::new(framing),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return match item {
                    Ok(event) => {
                        trace!(bytes = event.raw().len(), "decoded stream value");
                        Some((Ok(event), state))
                    }
                    Err(e) => {
                        warn!(error = %e, "stream decoding failed");
                        state.ready.clear();
                        state.done = true;
                        Some((Err(ClientError::Decode(e)), state))
                    }
                };
            }

            if state.done {
                return None;
            }
            if state.decoder.is_terminated() {
                trace!("stream end marker received");
                state.done = true;
                continue;
            }

            match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(&chunk);
                    state.ready.extend(events);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "stream interrupted by transport");
                    state.done = true;
                    return Some((Err(ClientError::Transport(e)), state));
                }
                None => {
                    state.done = true;
                    let events = state.decoder.finish();
                    state.ready.extend(events);
                }
            }
        }
    })
}

/// Extension trait to decode any transport chunk stream.
///
/// # Example
/// ```ignore
/// use gemstream::stream::{ChunkStreamExt, FramingMode};
///
/// let chunks = transport.post_stream(&url, &body).await?;
/// let mut values = chunks.decode_values(FramingMode::Sse);
/// while let Some(event) = values.next().await {
///     println!("{}", event?.raw());
/// }
/// ```
pub trait ChunkStreamExt: Stream<Item = Result<Bytes, TransportError>> + Send + Sized + 'static {
    fn decode_values(
        self,
        framing: FramingMode,
    ) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send {
        decode_stream(self, framing)
    }
}

impl<S> ChunkStreamExt for S where S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static {}
