//! `HttpTransport` against a mock HTTP server
//!
//! Exercises the real reqwest path end to end: request building, response
//! streaming, status handling and cancellation.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use journal_core::{
    Backend, ChannelObserver, ErrorKind, HttpTransport, ReflectionMessage, ReflectionRequest,
    RequestBuilder, SessionController,
};

const WAIT: Duration = Duration::from_secs(5);

/// Collect messages until the session reports completion or failure
async fn collect(rx: &mut UnboundedReceiver<ReflectionMessage>) -> Vec<ReflectionMessage> {
    let mut out = Vec::new();
    loop {
        let msg = timeout(WAIT, rx.recv())
            .await
            .expect("session did not finish in time")
            .expect("observer channel closed early");
        let terminal = msg.is_terminal();
        out.push(msg);
        if terminal {
            return out;
        }
    }
}

fn last_text(messages: &[ReflectionMessage]) -> Option<&str> {
    messages.iter().rev().find_map(|msg| match msg {
        ReflectionMessage::Stream { text } => Some(text.as_str()),
        _ => None,
    })
}

fn controller_for(server: &MockServer) -> SessionController<HttpTransport> {
    let builder = RequestBuilder::new()
        .with_remote_endpoint(format!("{}/v1/chat/completions", server.uri()))
        .with_local_endpoint(format!("{}/api/chat", server.uri()));
    let transport = HttpTransport::current(Duration::from_secs(2)).unwrap();
    SessionController::with_builder(transport, builder)
}

#[tokio::test]
async fn test_ollama_ndjson_stream() {
    let server = MockServer::start().await;
    let body = [
        r#"{"model":"qwen3","message":{"role":"assistant","content":"<think>"},"done":false}"#,
        r#"{"model":"qwen3","message":{"role":"assistant","content":"let me see"},"done":false}"#,
        r#"{"model":"qwen3","message":{"role":"assistant","content":"</think>\n\n"},"done":false}"#,
        r#"{"model":"qwen3","message":{"role":"assistant","content":"Sounds like"},"done":false}"#,
        r#"{"model":"qwen3","message":{"role":"assistant","content":" a full day."},"done":false}"#,
        r#"{"model":"qwen3","message":{"role":"assistant","content":""},"done":true}"#,
    ]
    .join("\n")
        + "\n";

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "qwen3", "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .expect(1)
        .mount(&server)
        .await;

    let controller = controller_for(&server);
    let (observer, mut rx) = ChannelObserver::channel();
    let backend = Backend::Local {
        model: Some("qwen3".to_string()),
    };
    controller
        .start(
            ReflectionRequest::reflection(backend, "Long day at work."),
            Arc::new(observer),
        )
        .unwrap();

    let messages = collect(&mut rx).await;
    assert_eq!(messages.last(), Some(&ReflectionMessage::Complete));
    assert_eq!(last_text(&messages), Some("Sounds like a full day."));
    assert!(messages.iter().all(|msg| match msg {
        ReflectionMessage::Stream { text } => !text.contains("think"),
        _ => true,
    }));
}

#[tokio::test]
async fn test_openai_sse_stream() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hey, thanks\"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" for sharing\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o", "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let controller = controller_for(&server);
    let (observer, mut rx) = ChannelObserver::channel();
    let backend = Backend::Remote {
        api_key: "sk-test".to_string(),
        model: "gpt-4o".to_string(),
    };
    controller
        .start(
            ReflectionRequest::question(backend, "entries", "What stood out?"),
            Arc::new(observer),
        )
        .unwrap();

    let messages = collect(&mut rx).await;
    assert_eq!(
        messages,
        vec![
            ReflectionMessage::Stream {
                text: "hey, thanks".to_string()
            },
            ReflectionMessage::Stream {
                text: "hey, thanks for sharing".to_string()
            },
            ReflectionMessage::Complete,
        ]
    );
}

#[tokio::test]
async fn test_server_error_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let controller = controller_for(&server);
    let (observer, mut rx) = ChannelObserver::channel();
    controller
        .start(
            ReflectionRequest::reflection(
                Backend::Local {
                    model: Some("llama3.2".to_string()),
                },
                "entry",
            ),
            Arc::new(observer),
        )
        .unwrap();

    let messages = collect(&mut rx).await;
    match messages.as_slice() {
        [ReflectionMessage::Error { kind, message }] => {
            assert_eq!(*kind, ErrorKind::Transport);
            assert!(message.contains("500"), "{message}");
            assert!(message.contains("model not loaded"), "{message}");
        }
        other => panic!("unexpected messages: {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_stops_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    "{\"message\":{\"content\":\"too late\"},\"done\":true}\n",
                    "application/x-ndjson",
                )
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let controller = controller_for(&server);
    let (observer, mut rx) = ChannelObserver::channel();
    let handle = controller
        .start(
            ReflectionRequest::reflection(
                Backend::Local {
                    model: Some("llama3.2".to_string()),
                },
                "entry",
            ),
            Arc::new(observer),
        )
        .unwrap();
    drop(handle);

    assert!(controller.cancel());

    // Either the aborted task dropped the observer or nothing arrived in time
    match timeout(Duration::from_secs(3), rx.recv()).await {
        Ok(None) | Err(_) => {}
        Ok(Some(msg)) => panic!("cancelled session delivered {msg:?}"),
    }
}
