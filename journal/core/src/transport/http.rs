//! HTTP Transport
//!
//! [`Transport`] over `reqwest`. Each request runs in its own task on the
//! supplied tokio runtime; the response body is forwarded to the sink as it
//! arrives. Cancelling aborts the task, which drops the connection.
//!
//! There is no retry. A non-2xx status, a connection failure or a body that
//! breaks off mid-stream all end in `on_error`.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::runtime::Handle;

use super::{CancelHandle, ChunkSink, OutboundRequest, Transport};

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body quoted in an error message
const MAX_ERROR_BODY: usize = 512;

/// Streaming HTTP transport
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    runtime: Handle,
}

impl HttpTransport {
    /// Create a transport spawning onto `runtime`
    #[must_use]
    pub fn new(runtime: Handle, connect_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client; using defaults");
                reqwest::Client::new()
            });

        Self {
            http_client,
            runtime,
        }
    }

    /// Create a transport on the current tokio runtime
    ///
    /// Returns `None` outside a runtime.
    #[must_use]
    pub fn current(connect_timeout: Duration) -> Option<Self> {
        Handle::try_current()
            .ok()
            .map(|runtime| Self::new(runtime, connect_timeout))
    }
}

impl Transport for HttpTransport {
    fn send_streaming(&self, request: OutboundRequest, sink: Arc<dyn ChunkSink>) -> CancelHandle {
        let format = request.format;
        let mut builder = self.http_client.post(&request.endpoint);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let builder = builder.json(&request.body);

        tracing::debug!(
            endpoint = %request.endpoint,
            format = format.display_name(),
            "Sending streaming request"
        );

        let task = self.runtime.spawn(async move {
            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "Request failed");
                    sink.on_error(format!("Request failed: {e}"));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let mut body = response.text().await.unwrap_or_default();
                if body.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                tracing::warn!(status = %status, format = format.display_name(), "Backend rejected request");
                sink.on_error(format!("Backend returned {status}: {}", body.trim()));
                return;
            }

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => sink.on_chunk(&bytes),
                    Err(e) => {
                        tracing::warn!(error = %e, "Response stream interrupted");
                        sink.on_error(format!("Connection lost: {e}"));
                        return;
                    }
                }
            }

            sink.on_complete();
        });

        let abort = task.abort_handle();
        CancelHandle::new(move || abort.abort())
    }
}
