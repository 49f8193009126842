//! Error Types
//!
//! Errors surfaced by the reflection core. Every `ReflectionError` is terminal
//! for the session that produced it; callers start a new session to retry.
//!
//! Frame-level decode failures (`DecodeError`) are deliberately kept out of
//! `ReflectionError`: a single malformed frame is skipped and never reaches a
//! caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a [`ReflectionError`], handed to UI adapters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing credential or model selection for the active backend
    Configuration,
    /// The text to reflect on (or the question) is empty
    EmptyInput,
    /// Network failure, non-2xx response, or connection drop mid-stream
    Transport,
}

impl ErrorKind {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration error",
            Self::EmptyInput => "empty input",
            Self::Transport => "transport error",
        }
    }
}

/// Errors reported to the caller of a reflection session
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReflectionError {
    /// Detected before any request is sent; never retried
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Detected before any request is sent; never retried
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Reported by the transport collaborator while the session was active
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ReflectionError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an empty-input error
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// The error classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::EmptyInput(_) => ErrorKind::EmptyInput,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// The message without the classification prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(msg) | Self::EmptyInput(msg) | Self::Transport(msg) => msg,
        }
    }

    /// Whether the error was raised before anything was sent
    #[must_use]
    pub fn is_pre_flight(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::EmptyInput(_))
    }
}

/// A single frame could not be decoded
///
/// Only ever logged and counted by the pipeline.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload of an SSE `data:` line was not valid JSON
    #[error("Malformed SSE payload: {0}")]
    MalformedEvent(#[source] serde_json::Error),

    /// A bare line was not valid JSON
    #[error("Malformed JSON line: {0}")]
    MalformedLine(#[source] serde_json::Error),
}
