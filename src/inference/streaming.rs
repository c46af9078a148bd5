//! NDJSON streaming response parser for Ollama's `/api/generate`.
//!
//! Reads a `reqwest::Response` as a byte stream, splits it on `\n`, parses
//! each line as one JSON object and emits a [`CommentChunk`] for every object
//! carrying a non-empty `response`. Network chunk boundaries are irrelevant:
//! objects split across chunks or batched into one chunk decode the same way.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::errors::InferenceError;
use super::types::{CommentChunk, GenerateChunk};

// ─── NDJSON stream ───────────────────────────────────────────────────────────

/// Parse a streaming generate response into `CommentChunk`s.
///
/// The stream ends after the body ends, after one `StreamError`, or after one
/// `Cancelled`, and keeps returning `None` if polled again. Cancellation drops
/// the response body, which closes the connection.
pub fn parse_ndjson_stream(
    response: reqwest::Response,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<CommentChunk, InferenceError>> + Send {
    let byte_stream = Box::pin(response.bytes_stream());
    let state = StreamState::new();

    stream::unfold(
        Some((byte_stream, state, cancel)),
        |slot| async move {
            let Some((mut byte_stream, mut state, cancel)) = slot else {
                return None;
            };

            loop {
                if cancel.is_cancelled() {
                    drop(byte_stream);
                    tracing::debug!("generate stream cancelled, response body dropped");
                    return Some((Err(InferenceError::Cancelled), None));
                }

                if let Some(chunk) = state.pending.pop_front() {
                    return Some((Ok(chunk), Some((byte_stream, state, cancel))));
                }

                if state.ended {
                    return None;
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => continue,
                    next = byte_stream.next() => match next {
                        Some(Ok(bytes)) => state.push_bytes(&bytes),
                        Some(Err(e)) => {
                            return Some((
                                Err(InferenceError::StreamError {
                                    reason: format!("stream read error: {e}"),
                                }),
                                None,
                            ));
                        }
                        None => state.finish(),
                    },
                }
            }
        },
    )
    .fuse()
}

// ─── Stream State ────────────────────────────────────────────────────────────

/// Line buffer plus decoded-but-not-yet-delivered chunks.
#[derive(Default)]
struct StreamState {
    /// Bytes of the current incomplete line. Kept as bytes so a multi-byte
    /// UTF-8 sequence split across network chunks is decoded whole.
    buffer: Vec<u8>,
    pending: VecDeque<CommentChunk>,
    ended: bool,
}

impl StreamState {
    fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and decode every complete line.
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.process_line(&line);
        }
    }

    /// End of body: decode whatever is left as a final unterminated line.
    fn finish(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(&line);
        }
        self.ended = true;
    }

    fn process_line(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        match decode_line(trimmed) {
            Ok(Some(chunk)) => {
                tracing::trace!(progress = chunk.progress, "decoded chunk");
                self.pending.push_back(chunk);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable chunk");
            }
        }
    }
}

/// Parse one NDJSON line.
///
/// Returns `Ok(None)` for objects without a non-empty `response` (status
/// lines, the final `done` object, in-band errors), which are logged and
/// otherwise ignored.
fn decode_line(line: &str) -> Result<Option<CommentChunk>, InferenceError> {
    let chunk: GenerateChunk =
        serde_json::from_str(line).map_err(|e| InferenceError::ChunkParseError {
            raw: line.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(ref error) = chunk.error {
        tracing::warn!(server_error = %error, "inference server reported an error in-stream");
    }

    if chunk.done {
        tracing::debug!(
            done_reason = chunk.done_reason.as_deref().unwrap_or("unknown"),
            eval_count = chunk.eval_count.unwrap_or(0),
            "inference server finished generation"
        );
    }

    Ok(chunk
        .response
        .filter(|text| !text.is_empty())
        .map(CommentChunk::new))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
