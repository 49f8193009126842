//! Stream Session
//!
//! One session per reflection, question or follow-up. The session owns the
//! pipeline (and with it the thinking filter state) and the text made
//! visible so far. It is purely synchronous: the controller feeds it
//! transport events and dispatches the updates it returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ReflectionError;
use crate::stream::{PipelineEvent, PipelineStats, StreamPipeline, WireFormat};

/// Session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Sessions started by this process, for [`SessionId`] suffixes
static SESSIONS_STARTED: AtomicU64 = AtomicU64::new(0);

impl SessionId {
    /// `session_<unix millis>_<sequence>`
    pub fn new() -> Self {
        Self::for_kind("session")
    }

    /// `<kind>_<unix millis>_<sequence>`, e.g. `question_1760700000000_3`
    ///
    /// The sequence keeps IDs distinct within one millisecond.
    pub fn for_kind(kind: &str) -> Self {
        let sequence = SESSIONS_STARTED.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis())
            .unwrap_or(0);
        Self(format!("{kind}_{millis}_{sequence}"))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Receiving chunks
    Streaming,
    /// Stream ended normally
    Completed,
    /// Transport reported an error
    Failed,
    /// Superseded by a newer session or cancelled by the caller
    Cancelled,
}

impl SessionState {
    /// Get a human-readable description of the state
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Streaming => "Streaming",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// What the caller needs to hear about
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The full visible text so far
    Stream(String),
    /// The stream finished
    Complete,
    /// The session failed
    Error(ReflectionError),
}

/// State of one request/response cycle
#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    format: WireFormat,
    pipeline: StreamPipeline,
    /// Append-only while streaming
    accumulated: String,
    state: SessionState,
    started_at: Instant,
}

impl StreamSession {
    /// Start a session expecting `format` on the wire
    #[must_use]
    pub fn new(format: WireFormat) -> Self {
        Self::with_id(SessionId::new(), format)
    }

    /// Start a session under a caller-chosen ID
    #[must_use]
    pub fn with_id(id: SessionId, format: WireFormat) -> Self {
        Self {
            id,
            format,
            pipeline: StreamPipeline::new(),
            accumulated: String::new(),
            state: SessionState::Streaming,
            started_at: Instant::now(),
        }
    }

    /// Session ID
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Expected wire format
    #[must_use]
    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether chunks are still being accepted
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Text made visible so far
    #[must_use]
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    /// Pipeline counters
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Time since the session started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Process a chunk from the transport
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Vec<SessionUpdate> {
        if !self.is_active() {
            return Vec::new();
        }
        let events = self.pipeline.push(chunk);
        self.apply(events)
    }

    /// The transport finished delivering the body
    pub fn on_transport_complete(&mut self) -> Vec<SessionUpdate> {
        if !self.is_active() {
            return Vec::new();
        }
        let events = self.pipeline.end_of_stream();
        self.apply(events)
    }

    /// The transport failed
    ///
    /// Text already made visible stays as it is.
    pub fn on_transport_error(&mut self, message: impl Into<String>) -> Vec<SessionUpdate> {
        if !self.is_active() {
            return Vec::new();
        }
        let error = ReflectionError::transport(message);
        self.state = SessionState::Failed;
        tracing::warn!(
            session_id = %self.id,
            error = %error,
            visible_len = self.accumulated.len(),
            "Reflection session failed"
        );
        vec![SessionUpdate::Error(error)]
    }

    /// Stop producing updates
    pub fn cancel(&mut self) {
        if self.is_active() {
            self.state = SessionState::Cancelled;
            tracing::debug!(session_id = %self.id, "Reflection session cancelled");
        }
    }

    fn apply(&mut self, events: Vec<PipelineEvent>) -> Vec<SessionUpdate> {
        let mut updates = Vec::with_capacity(events.len());
        for event in events {
            match event {
                PipelineEvent::Visible(text) => {
                    self.accumulated.push_str(&text);
                    updates.push(SessionUpdate::Stream(self.accumulated.clone()));
                }
                PipelineEvent::Finished => {
                    self.state = SessionState::Completed;
                    let stats = self.pipeline.stats();
                    tracing::info!(
                        session_id = %self.id,
                        format = self.format.display_name(),
                        elapsed_ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
                        frames = stats.frames,
                        skipped = stats.skipped,
                        tag = self.pipeline.suppressed_tag().unwrap_or("-"),
                        visible_len = self.accumulated.len(),
                        "Reflection session complete"
                    );
                    updates.push(SessionUpdate::Complete);
                }
            }
        }
        updates
    }
}
