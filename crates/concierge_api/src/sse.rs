use std::collections::VecDeque;

use futures_util::{stream, StreamExt};
use serde::de::IgnoredAny;
use tracing::debug;

use crate::client::ByteStream;
use crate::error::ApiError;
use crate::events::DONE_SENTINEL;

/// The only frame delimiter this server emits.
pub const DATA_PREFIX: &str = "data: ";

/// Incremental decoder turning SSE bytes into `data:` frame payloads.
///
/// The upstream writer emits one JSON object per `data:` line with no length
/// framing, so chunk boundaries may fall anywhere, including inside a UTF-8
/// sequence or inside the `data: ` prefix itself.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: String,
    pending_utf8: Vec<u8>,
    terminated: bool,
}

impl SseFrameDecoder {
    /// Feed arbitrary bytes into the decoder and drain complete frame payloads.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.terminated {
            return Vec::new();
        }
        self.decode_utf8(bytes);
        self.drain(false)
    }

    /// Flush whatever the buffer still holds at end of stream.
    pub fn finish(&mut self) -> Vec<String> {
        if self.terminated {
            return Vec::new();
        }
        if !self.pending_utf8.is_empty() {
            let tail = std::mem::take(&mut self.pending_utf8);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let frames = self.drain(true);
        self.buffer.clear();
        frames
    }

    /// Discard buffered bytes so the decoder can serve a new stream.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending_utf8.clear();
        self.terminated = false;
    }

    /// Decode a complete payload string in one shot.
    pub fn decode_all(input: &str) -> Vec<String> {
        let mut decoder = Self::default();
        let mut frames = decoder.feed(input.as_bytes());
        frames.extend(decoder.finish());
        frames
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty() && self.pending_utf8.is_empty()
    }

    /// True once `[DONE]` has been emitted; later bytes are ignored.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn decode_utf8(&mut self, bytes: &[u8]) {
        let mut input = std::mem::take(&mut self.pending_utf8);
        input.extend_from_slice(bytes);

        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(error) => {
                    let valid = error.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match error.error_len() {
                        Some(invalid) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + invalid..];
                        }
                        None => {
                            // Incomplete sequence at the end; wait for the next chunk.
                            self.pending_utf8 = rest[valid..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn drain(&mut self, at_end: bool) -> Vec<String> {
        let buffer = std::mem::take(&mut self.buffer);
        let pieces = split_at_prefix(&buffer);
        let last_index = pieces.len().saturating_sub(1);

        let mut frames = Vec::new();
        let mut carry: Option<String> = None;

        for (index, piece) in pieces.into_iter().enumerate() {
            let open_tail = index == last_index && !at_end;

            if !piece.starts_with(DATA_PREFIX) {
                if open_tail {
                    self.buffer = partial_prefix_suffix(piece).to_string();
                } else if !piece.trim().is_empty() {
                    debug!(bytes = piece.len(), "dropping SSE text outside a data frame");
                }
                continue;
            }

            let joined = match carry.take() {
                Some(previous) => format!("{previous}{piece}"),
                None => piece.to_string(),
            };
            let candidate = if joined.len() > piece.len()
                && !is_complete(frame_payload(&joined))
                && is_complete(frame_payload(piece))
            {
                piece.to_string()
            } else {
                joined.clone()
            };

            if open_tail && !line_terminated(&candidate) {
                // More bytes may still extend this line; keep the fragment joined.
                self.buffer = joined;
                continue;
            }
            if candidate.len() < joined.len() {
                debug!(
                    bytes = joined.len() - candidate.len(),
                    "dropping unterminated SSE fragment"
                );
            }

            let payload = frame_payload(&candidate);
            if is_complete(payload) {
                let terminal = payload == DONE_SENTINEL;
                frames.push(payload.to_string());
                if terminal {
                    self.terminated = true;
                    self.buffer.clear();
                    return frames;
                }
                if open_tail {
                    self.buffer = partial_prefix_suffix(&candidate).to_string();
                }
                continue;
            }

            if open_tail {
                self.buffer = candidate;
            } else if payload.contains('}') {
                // Looks finished but does not parse; the interpreter reports it.
                frames.push(payload.to_string());
            } else {
                carry = Some(candidate);
            }
        }

        if let Some(dropped) = carry {
            debug!(bytes = dropped.len(), "dropping incomplete SSE frame at end of stream");
        }

        frames
    }
}

/// Split `input` before every occurrence of [`DATA_PREFIX`], skipping empty pieces.
fn split_at_prefix(input: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in input.match_indices(DATA_PREFIX) {
        if index > start {
            pieces.push(&input[start..index]);
        }
        start = index;
    }
    if start < input.len() {
        pieces.push(&input[start..]);
    }
    pieces
}

/// Text of the first line after the prefix.
fn frame_payload(piece: &str) -> &str {
    let body = piece.strip_prefix(DATA_PREFIX).unwrap_or(piece);
    body.split('\n').next().unwrap_or(body).trim()
}

/// True once the frame's first line has seen its newline.
fn line_terminated(piece: &str) -> bool {
    piece
        .strip_prefix(DATA_PREFIX)
        .unwrap_or(piece)
        .contains('\n')
}

/// Longest suffix of `piece` that could be the start of a split `data: ` prefix.
fn partial_prefix_suffix(piece: &str) -> &str {
    (1..DATA_PREFIX.len())
        .rev()
        .find(|len| piece.ends_with(&DATA_PREFIX[..*len]))
        .map(|len| &piece[piece.len() - len..])
        .unwrap_or("")
}

fn is_complete(payload: &str) -> bool {
    payload == DONE_SENTINEL
        || (payload.starts_with('{') && serde_json::from_str::<IgnoredAny>(payload).is_ok())
}

/// Lazy sequence of frame payloads read from a chat byte stream.
///
/// Bytes are pulled only when the caller asks for the next frame. A read
/// failure discards everything buffered so far.
pub struct SseFrames {
    bytes: ByteStream,
    decoder: SseFrameDecoder,
    ready: VecDeque<String>,
    exhausted: bool,
}

impl SseFrames {
    pub fn new(bytes: ByteStream) -> Self {
        Self {
            bytes,
            decoder: SseFrameDecoder::default(),
            ready: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next payload, `None` at end of stream, or the transport error that ended it.
    pub async fn next_frame(&mut self) -> Option<Result<String, ApiError>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(Ok(frame));
            }
            if self.exhausted {
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = self.decoder.feed(&chunk);
                    self.ready.extend(frames);
                    if self.decoder.is_terminated() {
                        self.close_reader();
                    }
                }
                Some(Err(error)) => {
                    self.release();
                    return Some(Err(error));
                }
                None => {
                    let frames = self.decoder.finish();
                    self.ready.extend(frames);
                    self.close_reader();
                }
            }
        }
    }

    /// Drop the byte reader and clear every buffer.
    pub fn release(&mut self) {
        self.close_reader();
        self.ready.clear();
        self.decoder.reset();
    }

    pub fn is_released(&self) -> bool {
        self.exhausted && self.ready.is_empty()
    }

    fn close_reader(&mut self) {
        self.exhausted = true;
        self.bytes = stream::empty().boxed();
    }
}
