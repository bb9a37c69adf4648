//! Server-Sent Events processing for streaming responses.
//!
//! This module turns the raw byte stream of a streaming Messages API response into parsed
//! events, and those events into plain text fragments.

use std::error;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::engine::FragmentStream;
use crate::error::{Error, Result};

/// One parsed SSE event.  Only what is needed to recover the response text is kept.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StreamEvent {
    Ping,
    MessageStart,
    ContentBlockStart,
    TextDelta(String),
    /// A delta that carries no response text (tool input, thinking, signatures).
    OtherDelta,
    ContentBlockStop,
    MessageDelta,
    MessageStop,
    /// An event type this client does not know; skipped.
    Unknown,
}

#[derive(Deserialize)]
struct DeltaPayload {
    delta: Delta,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Delta {
    #[serde(rename = "text_delta")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

/// Process a stream of bytes into a stream of server-sent events.
///
/// Bytes are buffered until a complete event (terminated by a blank line) is available, so
/// events and multi-byte characters may be split across chunks.
pub(crate) fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result.map_err(|e| {
            Error::completion_engine(
                format!("Error in HTTP stream: {e}"),
                None,
                Some(Box::new(e)),
            )
        })
    })
    .fuse();
    let buffer: Vec<u8> = Vec::new();

    stream::unfold((stream, buffer), |(mut stream, mut buffer)| async move {
        loop {
            if let Some((event, remaining)) = extract_event(&buffer) {
                buffer = remaining;
                return Some((event, (stream, buffer)));
            }

            match stream.next().await {
                Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    return Some((Err(e), (stream, buffer)));
                }
                None => {
                    // A final event may be missing its trailing blank line.
                    if buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                        buffer.extend_from_slice(b"\n\n");
                        if let Some((event, _)) = extract_event(&buffer) {
                            return Some((event, (stream, Vec::new())));
                        }
                    }
                    return None;
                }
            }
        }
    })
}

/// Extract a complete SSE event from the front of `buffer`.
fn extract_event(buffer: &[u8]) -> Option<(Result<StreamEvent>, Vec<u8>)> {
    let (end, separator) = find_event_end(buffer)?;
    let rest = buffer[end + separator..].to_vec();
    let event_text = match std::str::from_utf8(&buffer[..end]) {
        Ok(text) => text,
        Err(e) => {
            return Some((
                Err(Error::completion_engine(
                    format!("Invalid UTF-8 in stream: {e}"),
                    None,
                    Some(Box::new(e)),
                )),
                rest,
            ));
        }
    };

    let mut event_type = None;
    let mut data_lines = Vec::new();
    for line in event_text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    let Some(event_type) = event_type.filter(|_| !data_lines.is_empty()) else {
        return Some((
            Err(Error::completion_engine(
                format!("Malformed SSE event: '{event_text}'"),
                None,
                None,
            )),
            rest,
        ));
    };
    let data = data_lines.join("\n");
    Some((parse_event_type(event_type, &data), rest))
}

/// Locate the blank line that ends the first event: returns (end of event, separator length).
fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Parse a specific SSE event type and its data.
fn parse_event_type(event_type: &str, data: &str) -> Result<StreamEvent> {
    match event_type {
        "ping" => Ok(StreamEvent::Ping),
        "message_start" => Ok(StreamEvent::MessageStart),
        "content_block_start" => Ok(StreamEvent::ContentBlockStart),
        "content_block_delta" => {
            let payload: DeltaPayload = serde_json::from_str(data).map_err(|e| {
                Error::completion_engine(
                    format!("Failed to parse content_block_delta: {e}"),
                    None,
                    Some(Box::new(e)),
                )
            })?;
            match payload.delta {
                Delta::Text { text } => Ok(StreamEvent::TextDelta(text)),
                Delta::Other => Ok(StreamEvent::OtherDelta),
            }
        }
        "content_block_stop" => Ok(StreamEvent::ContentBlockStop),
        "message_delta" => Ok(StreamEvent::MessageDelta),
        "message_stop" => Ok(StreamEvent::MessageStop),
        "error" => {
            let message = match serde_json::from_str::<ErrorPayload>(data) {
                Ok(ErrorPayload { error }) => match (error.error_type, error.message) {
                    (Some(kind), Some(message)) => format!("{kind}: {message}"),
                    (None, Some(message)) => message,
                    (Some(kind), None) => kind,
                    (None, None) => data.to_string(),
                },
                Err(_) => data.to_string(),
            };
            Err(Error::completion_engine(message, None, None))
        }
        other => {
            tracing::debug!(event_type = other, "skipping unknown SSE event");
            Ok(StreamEvent::Unknown)
        }
    }
}

/// Reduce an event stream to its text fragments.
///
/// The fragment stream ends at `message_stop`.  The first error ends it as well, after being
/// yielded; so does the byte stream ending early, which is reported as an error.
pub(crate) fn text_fragments<S>(events: S) -> FragmentStream
where
    S: Stream<Item = Result<StreamEvent>> + Send + 'static,
{
    let events = Box::pin(events);
    Box::pin(stream::unfold(Some(events), |state| async move {
        let mut events = state?;
        loop {
            match events.next().await {
                Some(Ok(StreamEvent::TextDelta(text))) => {
                    return Some((Ok(text), Some(events)));
                }
                Some(Ok(StreamEvent::MessageStop)) => return None,
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Some((Err(err), None)),
                None => {
                    return Some((
                        Err(Error::completion_engine(
                            "stream ended before message_stop",
                            None,
                            None,
                        )),
                        None,
                    ));
                }
            }
        }
    }))
}
