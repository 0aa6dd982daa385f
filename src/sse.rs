//! Server-Sent Events (SSE) stream processing utilities.
//!
//! Shared by the relay (reading the upstream stream) and the chat client
//! (reading the relay stream).
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! : comment
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::ClientError;

/// Carry-over buffer that turns arbitrarily split byte chunks into lines.
///
/// Only complete lines are released; the trailing incomplete segment is held
/// until a later chunk completes it. Splitting happens on raw bytes, so a
/// multi-byte character cut across two chunks is decoded intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    carry: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without the
    /// newline and with a trailing carriage return stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.carry[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.carry[start..end]));
            start = end + 1;
        }
        self.carry.drain(..start);
        lines
    }

    /// Release the held segment once the byte stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        let line = decode_line(&self.carry);
        self.carry.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parse an SSE line to extract the data portion.
///
/// Blank lines, `:` comments and other fields yield `None`.
///
/// # Example
/// ```
/// use vitals_chat::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// assert_eq!(parse_sse_line(": keep-alive"), None);
/// assert_eq!(parse_sse_line("event: message"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    if line.trim().is_empty() || line.starts_with(':') {
        return None;
    }
    line.strip_prefix("data: ").map(|s| s.trim())
}

/// Check if an SSE data payload is the end-of-stream marker.
///
/// # Example
/// ```
/// use vitals_chat::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == DONE_MARKER
}

pub const DONE_MARKER: &str = "[DONE]";

/// Turn a byte stream into the stream of its SSE `data:` payloads.
///
/// The done marker is yielded like any other payload; the caller decides
/// whether it ends consumption. A transport error is yielded once and ends
/// the stream.
pub fn sse_data<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    let byte_stream = Box::pin(byte_stream);

    stream::unfold(
        (byte_stream, LineBuffer::new(), Vec::<String>::new().into_iter(), false),
        |(mut byte_stream, mut buffer, mut pending, mut ended)| async move {
            loop {
                if let Some(line) = pending.next() {
                    if let Some(data) = parse_sse_line(&line) {
                        let data = data.to_string();
                        return Some((Ok(data), (byte_stream, buffer, pending, ended)));
                    }
                    continue;
                }

                if ended {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        pending = buffer.push(&chunk).into_iter();
                    }
                    Some(Err(e)) => {
                        ended = true;
                        return Some((Err(e.into()), (byte_stream, buffer, pending, ended)));
                    }
                    None => {
                        ended = true;
                        pending = buffer.finish().into_iter().collect::<Vec<_>>().into_iter();
                    }
                }
            }
        },
    )
}

/// Extension trait for `reqwest::Response` to enable SSE streaming.
pub trait SseResponseExt {
    /// Convert the response into a stream of SSE data payloads.
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send;
}

impl SseResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send {
        sse_data(self.bytes_stream())
    }
}
