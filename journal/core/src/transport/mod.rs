//! Transport Boundary
//!
//! The reflection core never opens connections itself. A [`Transport`] takes
//! a built [`OutboundRequest`] and feeds the response body, chunk by chunk,
//! into a [`ChunkSink`] owned by the session.
//!
//! # Contract
//!
//! - Chunks are delivered in order, one at a time
//! - Exactly one of `on_complete` / `on_error` ends the delivery
//! - After [`CancelHandle::cancel`] the transport stops as soon as it can;
//!   the session ignores anything that still arrives

pub mod http;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use crate::request::OutboundRequest;
pub use http::HttpTransport;

/// Receives the response body of one request
pub trait ChunkSink: Send + Sync {
    /// Raw bytes as they arrived from the network
    fn on_chunk(&self, chunk: &[u8]);

    /// The body ended normally
    fn on_complete(&self);

    /// The request failed or the connection dropped
    fn on_error(&self, message: String);
}

/// Sends streaming requests
pub trait Transport: Send + Sync {
    /// Start the request and return immediately
    ///
    /// Delivery happens on whatever thread or task the implementation
    /// chooses, possibly before this call returns.
    fn send_streaming(&self, request: OutboundRequest, sink: Arc<dyn ChunkSink>) -> CancelHandle;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send_streaming(&self, request: OutboundRequest, sink: Arc<dyn ChunkSink>) -> CancelHandle {
        (**self).send_streaming(request, sink)
    }
}

/// Stops an in-flight request
///
/// Cancelling is idempotent; the underlying action runs at most once.
#[derive(Clone)]
pub struct CancelHandle {
    action: Option<Arc<dyn Fn() + Send + Sync>>,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Handle that runs `action` on the first `cancel()`
    pub fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            action: Some(Arc::new(action)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle with nothing to stop
    #[must_use]
    pub fn noop() -> Self {
        Self {
            action: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop the request
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(action) = &self.action {
            action();
        }
    }

    /// Whether `cancel()` has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
