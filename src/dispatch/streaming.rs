// Lazy decoding of streamed response bodies
// Author: kelexine (https://github.com/kelexine)

use crate::codec::BodyCodec;
use crate::error::{GatewayError, Result};
use crate::models::{Outcome, OutcomeStream};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// How elements are delimited in a streamed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One element per line (`application/x-ndjson`, `application/jsonl`).
    Lines,
    /// Server-sent events, one element per `data:` payload.
    Events,
    /// A single document; a top-level array yields its elements one by one.
    Document,
}

impl Framing {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Framing::Document;
        };
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/event-stream" => Framing::Events,
            "application/x-ndjson" | "application/ndjson" | "application/jsonl"
            | "application/x-jsonlines" | "application/stream+json" => Framing::Lines,
            _ => Framing::Document,
        }
    }
}

/// Decode a response byte stream into a lazy, single-pass stream of elements.
///
/// Nothing is read until the returned stream is polled. A read failure or an
/// element that does not decode ends the stream with an error item.
pub fn decode_stream<S>(
    byte_stream: S,
    framing: Framing,
    codec: Arc<dyn BodyCodec>,
    operation: String,
) -> OutcomeStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut pending_cr = false;
        let mut elements = 0usize;

        futures::pin_mut!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Stream error on {}: {}", operation, e);
                    yield Err(GatewayError::Http(e));
                    return;
                }
            };
            debug!("Received chunk: {} bytes", chunk.len());

            if framing == Framing::Document {
                buffer.extend_from_slice(&chunk);
                continue;
            }
            push_normalized(&mut buffer, &chunk, &mut pending_cr);

            // Process complete frames
            let delimiter: &[u8] = if framing == Framing::Lines { b"\n" } else { b"\n\n" };
            while let Some(end) = find(&buffer, delimiter) {
                let frame: Vec<u8> = buffer.drain(..end + delimiter.len()).collect();
                let frame = &frame[..end];
                match decode_frame(framing, frame, codec.as_ref(), &operation) {
                    Ok(Some(value)) => {
                        elements += 1;
                        yield Ok(Outcome::Value(value));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if pending_cr {
            buffer.push(b'\n');
        }

        match framing {
            Framing::Document => {
                match decode_document(&buffer, codec.as_ref(), &operation) {
                    Ok(values) => {
                        for value in values {
                            elements += 1;
                            yield Ok(Outcome::Value(value));
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
            // Final frame without a trailing delimiter
            Framing::Lines | Framing::Events => {
                if !buffer.iter().all(u8::is_ascii_whitespace) {
                    debug!("Processing remaining buffer: {} bytes", buffer.len());
                    match decode_frame(framing, &buffer, codec.as_ref(), &operation) {
                        Ok(Some(value)) => {
                            elements += 1;
                            yield Ok(Outcome::Value(value));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        }

        debug!("Stream for {} ended after {} elements", operation, elements);
    };

    stream.boxed()
}

/// Append `chunk` with `\r\n` and lone `\r` line endings rewritten to `\n`.
///
/// A trailing `\r` is held in `pending_cr` until the next byte shows whether
/// it starts a `\r\n` pair split across chunks.
fn push_normalized(buffer: &mut Vec<u8>, chunk: &[u8], pending_cr: &mut bool) {
    for &byte in chunk {
        if *pending_cr {
            *pending_cr = false;
            buffer.push(b'\n');
            if byte == b'\n' {
                continue;
            }
        }
        if byte == b'\r' {
            *pending_cr = true;
        } else {
            buffer.push(byte);
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn decode_error(operation: &str, e: GatewayError) -> GatewayError {
    GatewayError::Decode {
        operation: operation.to_string(),
        reason: e.to_string(),
    }
}

fn decode_frame(
    framing: Framing,
    frame: &[u8],
    codec: &dyn BodyCodec,
    operation: &str,
) -> Result<Option<Value>> {
    match framing {
        Framing::Lines => {
            let line = trim_ascii(frame);
            if line.is_empty() {
                return Ok(None);
            }
            codec
                .decode(line)
                .map(Some)
                .map_err(|e| decode_error(operation, e))
        }
        Framing::Events => {
            let text = String::from_utf8_lossy(frame);
            let Some(data) = event_data(&text) else {
                return Ok(None);
            };
            codec
                .decode(data.as_bytes())
                .map(Some)
                .map_err(|e| decode_error(operation, e))
        }
        Framing::Document => decode_document(frame, codec, operation)
            .map(|mut values| values.pop()),
    }
}

fn decode_document(bytes: &[u8], codec: &dyn BodyCodec, operation: &str) -> Result<Vec<Value>> {
    match codec.decode(bytes).map_err(|e| decode_error(operation, e))? {
        Value::Null => Ok(Vec::new()),
        Value::Array(values) => Ok(values),
        value => Ok(vec![value]),
    }
}

/// Extract the `data:` payload of one SSE event.
///
/// Multiple `data:` lines are joined with `\n`. Events without data, or with
/// the `[DONE]` marker, carry no element.
fn event_data(event: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in event.lines() {
        let line = line.trim_end_matches('\r');
        let Some(rest) = line.strip_prefix("data:") else {
            continue;
        };
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(rest);
            }
            None => data = Some(rest.to_string()),
        }
    }

    let data = data?;
    if data.trim().is_empty() || data.trim() == "[DONE]" {
        debug!("Skipping empty or DONE event");
        return None;
    }
    Some(data)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(start);
    &bytes[start..end]
}
