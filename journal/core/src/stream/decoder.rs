//! Frame Decoder
//!
//! Turns one frame from the demultiplexer into normalized deltas. Two wire
//! formats are understood without the caller having to say which one is in
//! use:
//!
//! - **Remote** (OpenAI-style SSE): `data: {json}` lines carrying
//!   `choices[0].delta.content`, terminated by `data: [DONE]`.
//! - **Local** (Ollama `/api/chat`): bare JSON lines carrying
//!   `message.content` and a `done` flag on the final line.
//!
//! Frames that carry no content (role-only deltas, blank keep-alive lines)
//! decode to nothing. Anything else that is not JSON (SSE comments, `event:`
//! lines, garbage) decodes to a [`DecodeError`] which the pipeline skips.

use serde::Deserialize;

use crate::error::DecodeError;

/// Prefix of an SSE payload line
pub const SSE_DATA_PREFIX: &str = "data: ";

/// SSE end-of-stream sentinel
pub const SSE_DONE_SENTINEL: &str = "[DONE]";

/// A normalized event decoded from one frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamDelta {
    /// A non-empty piece of model output
    Content(String),
    /// Local format completion flag (`"done": true`)
    Done,
    /// SSE `[DONE]` sentinel
    Terminal,
}

impl StreamDelta {
    /// Whether this delta ends the stream
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::Done | Self::Terminal)
    }
}

/// Wire format spoken by a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireFormat {
    /// SSE framing, `[DONE]` sentinel, chat-completion delta schema
    Remote,
    /// JSON-lines framing, `done` flag, nested `message.content` schema
    Local,
}

impl WireFormat {
    /// The `Content-Type` the backend answers with
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Remote => "text/event-stream",
            Self::Local => "application/x-ndjson",
        }
    }

    /// Display name for logs
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Remote => "OpenAI SSE",
            Self::Local => "Ollama JSON lines",
        }
    }
}

// ============================================================================
// Payload schemas
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a single frame
///
/// Returns the deltas in the order they must be applied. A local-format frame
/// may carry both content and the completion flag; content comes first.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the frame is not valid JSON. Callers skip
/// such frames.
pub fn decode_frame(frame: &str) -> Result<Vec<StreamDelta>, DecodeError> {
    if let Some(payload) = frame.strip_prefix(SSE_DATA_PREFIX) {
        return decode_sse_payload(payload);
    }

    let line = frame.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }
    decode_json_line(line)
}

fn decode_sse_payload(payload: &str) -> Result<Vec<StreamDelta>, DecodeError> {
    if payload == SSE_DONE_SENTINEL {
        return Ok(vec![StreamDelta::Terminal]);
    }

    let chunk: ChatCompletionChunk =
        serde_json::from_str(payload).map_err(DecodeError::MalformedEvent)?;

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty());

    Ok(content.map(StreamDelta::Content).into_iter().collect())
}

fn decode_json_line(line: &str) -> Result<Vec<StreamDelta>, DecodeError> {
    let chunk: OllamaChatChunk = serde_json::from_str(line).map_err(DecodeError::MalformedLine)?;

    let mut deltas = Vec::with_capacity(2);
    if let Some(content) = chunk
        .message
        .and_then(|message| message.content)
        .filter(|content| !content.is_empty())
    {
        deltas.push(StreamDelta::Content(content));
    }
    if chunk.done == Some(true) {
        deltas.push(StreamDelta::Done);
    }
    Ok(deltas)
}
