//! Session Controller
//!
//! Orchestrates reflection requests end to end: validates and builds the
//! outbound request, hands it to the transport, and routes what comes back
//! through a fresh [`StreamSession`] to the caller's [`StreamObserver`].
//!
//! # Supersession
//!
//! Only the most recently started session may talk to its observer. Every
//! `start()` (and every `cancel()`) bumps a generation counter; a session's
//! sink compares its own generation against the counter before each
//! callback, so a stale session goes silent even while its transport is
//! still delivering chunks. The old transport request is cancelled too.
//!
//! # Threading
//!
//! Chunk processing for a session is serialized behind a mutex. Observer
//! callbacks run after the lock is released, so an observer may call back
//! into the controller (for example to start the next session).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ReflectionError;
use crate::observer::StreamObserver;
use crate::request::{ReflectionRequest, RequestBuilder};
use crate::session::{SessionId, SessionState, SessionUpdate, StreamSession};
use crate::transport::{CancelHandle, ChunkSink, Transport};

/// Drives one reflection session at a time
pub struct SessionController<T: Transport> {
    transport: T,
    builder: RequestBuilder,
    /// Generation of the session allowed to call back
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActiveSession>>,
}

struct ActiveSession {
    generation: u64,
    sink: Arc<SessionSink>,
    /// `None` until the transport has returned its handle
    cancel: Option<CancelHandle>,
}

impl ActiveSession {
    fn stop(self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        self.sink.session.lock().cancel();
    }
}

impl<T: Transport> SessionController<T> {
    /// Create a controller with the default request builder
    pub fn new(transport: T) -> Self {
        Self::with_builder(transport, RequestBuilder::new())
    }

    /// Create a controller with custom endpoints or prompts
    pub fn with_builder(transport: T, builder: RequestBuilder) -> Self {
        Self {
            transport,
            builder,
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    /// Start a new session, superseding any session still in flight
    ///
    /// Pre-flight failures are reported to `observer` before this returns,
    /// and returned as well. In that case nothing is sent and the session
    /// already in flight (if any) is left alone.
    ///
    /// # Errors
    ///
    /// `Configuration` or `EmptyInput` when the request cannot be sent.
    pub fn start(
        &self,
        request: ReflectionRequest,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<SessionHandle, ReflectionError> {
        let outbound = match self.builder.build(&request) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::info!(kind = request.kind.label(), error = %e, "Reflection not started");
                observer.on_error(&e);
                return Err(e);
            }
        };

        let session =
            StreamSession::with_id(SessionId::for_kind(request.kind.label()), outbound.format);
        let id = session.id().clone();

        let (sink, generation, previous) = {
            let mut active = self.active.lock();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let sink = Arc::new(SessionSink {
                generation,
                current: Arc::clone(&self.generation),
                session: Mutex::new(session),
                observer,
            });
            let previous = active.replace(ActiveSession {
                generation,
                sink: Arc::clone(&sink),
                cancel: None,
            });
            (sink, generation, previous)
        };

        if let Some(previous) = previous {
            tracing::debug!(
                superseded = %previous.sink.id(),
                session_id = %id,
                "Superseding previous session"
            );
            previous.stop();
        }

        tracing::info!(
            session_id = %id,
            kind = request.kind.label(),
            format = outbound.format.display_name(),
            model = request.backend.model().unwrap_or("-"),
            "Reflection session started"
        );

        let cancel = self
            .transport
            .send_streaming(outbound, Arc::clone(&sink) as Arc<dyn ChunkSink>);

        {
            let mut active = self.active.lock();
            match active.as_mut() {
                Some(current) if current.generation == generation => current.cancel = Some(cancel),
                // Superseded while the transport was starting
                _ => cancel.cancel(),
            }
        }

        Ok(SessionHandle {
            id,
            generation,
            current: Arc::clone(&self.generation),
            sink,
        })
    }

    /// Cancel the current session
    ///
    /// Its observer receives nothing further. Returns `false` when there was
    /// no session to cancel.
    pub fn cancel(&self) -> bool {
        let previous = {
            let mut active = self.active.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            active.take()
        };

        match previous {
            Some(previous) => {
                tracing::debug!(session_id = %previous.sink.id(), "Cancelling session");
                previous.stop();
                true
            }
            None => false,
        }
    }

    /// Whether the current session is still receiving
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.active.lock().as_ref().is_some_and(|active| {
            active.sink.is_current() && active.sink.state() == SessionState::Streaming
        })
    }

    /// ID of the most recently started session, unless it was cancelled
    #[must_use]
    pub fn current_session(&self) -> Option<SessionId> {
        self.active.lock().as_ref().map(|active| active.sink.id())
    }
}

/// Caller's view of a started session
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    generation: u64,
    current: Arc<AtomicU64>,
    sink: Arc<SessionSink>,
}

impl SessionHandle {
    /// Session ID
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Whether this is still the controller's current session
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.sink.state()
    }

    /// Visible text so far
    #[must_use]
    pub fn accumulated_text(&self) -> String {
        self.sink.session.lock().accumulated_text().to_string()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("current", &self.is_current())
            .finish()
    }
}

/// Bridges transport callbacks to one session and its observer
struct SessionSink {
    generation: u64,
    current: Arc<AtomicU64>,
    session: Mutex<StreamSession>,
    observer: Arc<dyn StreamObserver>,
}

impl SessionSink {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    fn id(&self) -> SessionId {
        self.session.lock().id().clone()
    }

    fn state(&self) -> SessionState {
        self.session.lock().state()
    }

    fn dispatch(&self, updates: Vec<SessionUpdate>) {
        for update in updates {
            if !self.is_current() {
                return;
            }
            match update {
                SessionUpdate::Stream(text) => self.observer.on_stream(&text),
                SessionUpdate::Complete => self.observer.on_complete(),
                SessionUpdate::Error(e) => self.observer.on_error(&e),
            }
        }
    }
}

impl ChunkSink for SessionSink {
    fn on_chunk(&self, chunk: &[u8]) {
        if !self.is_current() {
            return;
        }
        let updates = self.session.lock().on_chunk(chunk);
        self.dispatch(updates);
    }

    fn on_complete(&self) {
        if !self.is_current() {
            return;
        }
        let updates = self.session.lock().on_transport_complete();
        self.dispatch(updates);
    }

    fn on_error(&self, message: String) {
        if !self.is_current() {
            return;
        }
        let updates = self.session.lock().on_transport_error(message);
        self.dispatch(updates);
    }
}
