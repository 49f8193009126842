//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async code in the core library and the CLI MUST NOT block the
//! runtime. Use `tokio::fs`, `tokio::io` and the async `reqwest` client.
//! Plain functions that run before the runtime hands work off (config
//! loading, argument parsing) may use `std::fs`.

use architectural_enforcement::{in_async_context, production_lines, rust_files};

const CHECKED_DIRS: &[&str] = &["journal/core/src", "journal/cli/src"];

/// Blocking calls that are never allowed in production code
const ALWAYS_FORBIDDEN: &[(&str, &str)] = &[
    ("reqwest::blocking", "Blocking HTTP client"),
    ("thread::sleep", "Thread sleep"),
];

/// Blocking calls that are forbidden inside async functions
const ASYNC_FORBIDDEN: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::io::stdout()", "Blocking stdout"),
    ("std::process::Command", "Blocking process I/O"),
];

fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for dir in CHECKED_DIRS {
        for path in rust_files(dir) {
            let lines = production_lines(&path);
            for (idx, line) in lines.iter().enumerate() {
                for (needle, label) in ALWAYS_FORBIDDEN {
                    if line.code.contains(needle) {
                        violations.push(format!("{line} ({label})"));
                    }
                }

                if !in_async_context(&lines, idx) {
                    continue;
                }
                for (needle, label) in ASYNC_FORBIDDEN {
                    if line.code.contains(needle) {
                        violations.push(format!("{line} ({label} in async code)"));
                    }
                }
            }
        }
    }

    violations
}

#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking I/O found in async production code:\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use instead:");
        eprintln!("  - tokio::fs::read_to_string().await");
        eprintln!("  - tokio::io::stdout() with AsyncWriteExt");
        eprintln!("  - reqwest::Client (async)");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_no_unwrap_in_production_code() {
    let mut offenders = Vec::new();

    for dir in CHECKED_DIRS {
        for line in architectural_enforcement::production_lines_in(dir) {
            if line.code.contains(".unwrap()") || line.code.contains(".expect(") {
                offenders.push(line.to_string());
            }
        }
    }

    assert!(
        offenders.is_empty(),
        "production code must propagate errors instead of panicking:\n{}",
        offenders.join("\n")
    );
}
