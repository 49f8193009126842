//! Integration Test: Stream Core Purity
//!
//! The demultiplexer, decoder, thinking filter and pipeline are plain
//! synchronous state machines. They are driven by whichever thread the
//! transport delivers bytes on, and tested without a runtime.
//!
//! **Policy**: `journal/core/src/stream` MUST NOT depend on an async runtime,
//! an HTTP client, or threading and locking primitives.

use architectural_enforcement::production_lines_in;

const STREAM_DIR: &str = "journal/core/src/stream";

/// Path fragments that tie code to a runtime, the network, or threads
const FORBIDDEN: &[(&str, &str)] = &[
    ("tokio", "async runtime"),
    ("futures", "async runtime"),
    ("reqwest", "HTTP client"),
    ("std::thread", "threading"),
    ("std::sync", "locking"),
    ("parking_lot", "locking"),
    ("crate::transport", "transport layer"),
    ("crate::session", "session layer"),
    ("crate::controller", "controller layer"),
];

#[test]
fn test_stream_module_is_pure() {
    let mut violations = Vec::new();

    for line in production_lines_in(STREAM_DIR) {
        for (needle, concern) in FORBIDDEN {
            if line.code.contains(needle) {
                violations.push(format!("{line} ({concern})"));
            }
        }
    }

    if !violations.is_empty() {
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        panic!(
            "\nFound {} forbidden dependency(ies) in the stream module.\n\
             Keep runtime and I/O concerns in transport/session/controller.",
            violations.len()
        );
    }
}

/// Whether `code` contains an `.await` expression, not just a method
/// whose name starts with "await"
fn awaits(code: &str) -> bool {
    code.match_indices(".await").any(|(i, m)| {
        code[i + m.len()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
    })
}

#[test]
fn test_awaits_ignores_method_names() {
    assert!(awaits("let x = fut.await;"));
    assert!(awaits("read().await?"));
    assert!(!awaits("self.await_visible(buffer)"));
}

#[test]
fn test_stream_module_has_no_async_fns() {
    let offenders: Vec<String> = production_lines_in(STREAM_DIR)
        .into_iter()
        .filter(|line| line.code.contains("async fn") || awaits(&line.code))
        .map(|line| line.to_string())
        .collect();

    assert!(
        offenders.is_empty(),
        "stream module must stay synchronous:\n{}",
        offenders.join("\n")
    );
}
