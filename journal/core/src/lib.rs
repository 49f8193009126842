//! Journal Core - Streaming Reflection Processing
//!
//! This crate turns a streamed chat response from a remote (OpenAI-style SSE)
//! or local (Ollama JSON lines) language model into the text a journal UI
//! shows while the reflection is being written. It has no UI framework
//! dependency; a desktop app, a TUI or the `journal-reflect` CLI drive it
//! through the same [`StreamObserver`] callbacks.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  UI surface (desktop / CLI)            StreamObserver callbacks    │
//! │      start(request) ─────┐               ▲ on_stream(full_text)    │
//! │                          │               │ on_complete / on_error  │
//! └──────────────────────────┼───────────────┼─────────────────────────┘
//!                            ▼               │
//! ┌──────────────────────────────────────────┼─────────────────────────┐
//! │  SessionController ── RequestBuilder     │                          │
//! │        │                                 │                          │
//! │        ▼                                 │                          │
//! │   Transport ──bytes──▶ StreamSession ────┘                          │
//! │   (HttpTransport)        │                                          │
//! │                          ▼                                          │
//! │        LineDemuxer ─▶ decode_frame ─▶ ThinkingFilter               │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SessionController`]: Starts, supersedes and cancels sessions
//! - [`StreamSession`]: Per-request state and accumulated visible text
//! - [`ThinkingFilter`]: Removes a leading `<think>...</think>` style block
//! - [`RequestBuilder`]: Validates requests and builds the HTTP payload
//! - [`HttpTransport`]: `reqwest` implementation of [`Transport`]
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use journal_core::{
//!     load_config, ChannelObserver, HttpTransport, ReflectionMessage, ReflectionRequest,
//!     SessionController,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let transport = HttpTransport::current(config.connect_timeout).unwrap();
//!     let controller = SessionController::with_builder(transport, config.request_builder());
//!
//!     let (observer, mut rx) = ChannelObserver::channel();
//!     let backend = config.backend(std::env::var("OPENAI_API_KEY").ok().as_deref());
//!     controller.start(
//!         ReflectionRequest::reflection(backend, "Long day, good talk with Sam."),
//!         Arc::new(observer),
//!     )?;
//!
//!     while let Some(msg) = rx.recv().await {
//!         match msg {
//!             ReflectionMessage::Stream { text } => println!("{text}"),
//!             ReflectionMessage::Complete | ReflectionMessage::Error { .. } => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod observer;
pub mod request;
pub mod session;
pub mod stream;
pub mod transport;

pub use config::{
    default_config_path, load_config, load_config_from_path, BackendMode, ConfigError,
    ConfigOverrides, ConfigSource, ReflectionConfig,
};
pub use controller::{SessionController, SessionHandle};
pub use error::{DecodeError, ErrorKind, ReflectionError};
pub use observer::{ChannelObserver, ReflectionMessage, StreamObserver};
pub use request::{Backend, OutboundRequest, ReflectionKind, ReflectionRequest, RequestBuilder};
pub use session::{SessionId, SessionState, SessionUpdate, StreamSession};
pub use stream::{
    decode_frame, FilterState, LineDemuxer, PipelineEvent, PipelineStats, StreamDelta,
    StreamPipeline, ThinkingFilter, WireFormat,
};
pub use transport::{CancelHandle, ChunkSink, HttpTransport, Transport};
