//! Caller Callbacks
//!
//! The reflection core reports progress through a [`StreamObserver`]. The
//! observer is invoked on whichever thread the transport delivers chunks on;
//! UI adapters that need a specific thread use [`ChannelObserver`] and drain
//! the channel where they render.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{ErrorKind, ReflectionError};

/// Receives the output of one reflection session
///
/// A superseded or cancelled session never calls its observer again.
pub trait StreamObserver: Send + Sync {
    /// The full visible text accumulated so far
    ///
    /// Each call receives a prefix-extension of the previous call's text.
    fn on_stream(&self, full_text: &str);

    /// The stream finished successfully
    fn on_complete(&self);

    /// The session failed; no `on_complete` follows
    fn on_error(&self, error: &ReflectionError);
}

/// Observer callbacks as values, for crossing thread boundaries
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReflectionMessage {
    /// Accumulated visible text
    Stream {
        /// Full text so far
        text: String,
    },
    /// Stream finished
    Complete,
    /// Session failed
    Error {
        /// Error classification
        kind: ErrorKind,
        /// Human-readable detail
        message: String,
    },
}

impl ReflectionMessage {
    /// Whether no further messages follow for the session
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error { .. })
    }
}

impl From<&ReflectionError> for ReflectionMessage {
    fn from(error: &ReflectionError) -> Self {
        Self::Error {
            kind: error.kind(),
            message: error.message().to_string(),
        }
    }
}

/// Observer that forwards every callback over an unbounded channel
#[derive(Clone, Debug)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ReflectionMessage>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReflectionMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wrap an existing sender
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<ReflectionMessage>) -> Self {
        Self { tx }
    }

    fn send(&self, message: ReflectionMessage) {
        if self.tx.send(message).is_err() {
            tracing::trace!("Reflection receiver dropped; message discarded");
        }
    }
}

impl StreamObserver for ChannelObserver {
    fn on_stream(&self, full_text: &str) {
        self.send(ReflectionMessage::Stream {
            text: full_text.to_string(),
        });
    }

    fn on_complete(&self) {
        self.send(ReflectionMessage::Complete);
    }

    fn on_error(&self, error: &ReflectionError) {
        self.send(error.into());
    }
}
