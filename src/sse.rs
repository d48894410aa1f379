//! Server-Sent Events (SSE) framing.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! : keep-alive comment
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//!
//! Each `data:` line carries one JSON value. Blank lines separate frames,
//! comments and other fields are skipped, and `[DONE]` ends the stream.

use tracing::trace;

use crate::client::DecodeError;
use crate::stream::StreamEvent;

/// Incremental decoder for SSE-framed JSON values.
///
/// Bytes are buffered until a newline completes a line, so a line split
/// across any number of chunks decodes the same as an intact one.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    done: bool,
    failed: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk and collect every value it completes.
    ///
    /// An error is always the last item; the decoder ignores input after it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, DecodeError>> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.done || self.failed {
                break;
            }
            if byte != b'\n' {
                self.line.push(byte);
                continue;
            }

            let line = std::mem::take(&mut self.line);
            match self.process_line(&line) {
                Ok(Some(event)) => events.push(Ok(event)),
                Ok(None) => {}
                Err(e) => {
                    self.failed = true;
                    events.push(Err(e));
                }
            }
        }
        events
    }

    /// Signal end of input. An unterminated final line is still processed.
    pub fn finish(&mut self) -> Vec<Result<StreamEvent, DecodeError>> {
        if self.done || self.failed {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.line);
        match self.process_line(&line) {
            Ok(Some(event)) => vec![Ok(event)],
            Ok(None) => Vec::new(),
            Err(e) => {
                self.failed = true;
                vec![Err(e)]
            }
        }
    }

    fn process_line(&mut self, line: &[u8]) -> Result<Option<StreamEvent>, DecodeError> {
        let line = std::str::from_utf8(line)?.trim_end_matches('\r');

        if line.trim().is_empty() {
            return Ok(None);
        }
        if line.starts_with(':') {
            trace!(comment = line, "skipping SSE comment");
            return Ok(None);
        }

        match parse_sse_line(line) {
            Some(data) if is_done_marker(data) => {
                self.done = true;
                Ok(None)
            }
            Some("") => Ok(None),
            Some(data) => StreamEvent::parse(data.as_bytes()).map(Some),
            None => {
                trace!(line = line, "skipping non-data SSE field");
                Ok(None)
            }
        }
    }
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`
///
/// # Example
/// ```
/// use gemstream::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "event: message";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|s| s.trim())
}

/// Check if an SSE data line indicates the stream is done.
///
/// # Example
/// ```
/// use gemstream::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}
