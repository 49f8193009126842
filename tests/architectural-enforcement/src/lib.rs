//! Architectural Enforcement
//!
//! Helpers shared by the source-scanning tests in `tests/`. They walk the
//! workspace sources and yield production lines: everything before a file's
//! `#[cfg(test)]` module, with comments removed.

use std::fs;
use std::path::{Path, PathBuf};

/// A line of production code
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub path: PathBuf,
    pub number: usize,
    /// The line with any trailing `//` comment removed
    pub code: String,
    /// Index of the line within its file
    pub index: usize,
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.number, self.code.trim())
    }
}

/// Workspace root, resolved from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// All `.rs` files below `dir`, relative to the workspace root
///
/// # Panics
///
/// Panics when the directory does not exist, so a moved crate cannot make
/// a check pass vacuously.
#[must_use]
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    assert!(root.is_dir(), "source directory missing: {}", root.display());

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

/// Production lines of `path`
///
/// Stops at the first `#[cfg(test)]` attribute; unit tests live at the
/// bottom of each file in this workspace.
#[must_use]
pub fn production_lines(path: &Path) -> Vec<SourceLine> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .map(|(index, line)| SourceLine {
            path: path.to_path_buf(),
            number: index + 1,
            code: strip_comment(line).to_string(),
            index,
        })
        .collect()
}

/// Production lines of every `.rs` file below `dir`
#[must_use]
pub fn production_lines_in(dir: &str) -> Vec<SourceLine> {
    rust_files(dir)
        .iter()
        .flat_map(|path| production_lines(path))
        .collect()
}

/// Remove a `//` comment, ignoring `//` inside string literals such as URLs
#[must_use]
pub fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let bytes = line.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'/' if !in_string && bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Whether the function enclosing `lines[index]` is `async`
///
/// Scans back to the nearest `fn` signature. An `async move` block inside
/// a plain function counts as async from its opening line on.
#[must_use]
pub fn in_async_context(lines: &[SourceLine], index: usize) -> bool {
    for line in lines[..=index].iter().rev() {
        let code = line.code.trim();
        if code.contains("async move") || code.contains("async {") {
            return true;
        }
        if code.contains("fn ") {
            return code.contains("async fn");
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("let x = 1; // one"), "let x = 1; ");
        assert_eq!(
            strip_comment(r#"let url = "http://localhost"; // local"#),
            r#"let url = "http://localhost"; "#
        );
        assert_eq!(strip_comment("//! docs"), "");
        assert_eq!(strip_comment(r#"let s = "a\"//b";"#), r#"let s = "a\"//b";"#);
    }

    fn lines(src: &[&str]) -> Vec<SourceLine> {
        src.iter()
            .enumerate()
            .map(|(index, code)| SourceLine {
                path: PathBuf::from("x.rs"),
                number: index + 1,
                code: (*code).to_string(),
                index,
            })
            .collect()
    }

    #[test]
    fn test_in_async_context() {
        let src = lines(&[
            "async fn run() {",
            "    read();",
            "}",
            "fn load() {",
            "    read();",
            "    spawn(async move {",
            "        read();",
            "    });",
            "}",
        ]);
        assert!(in_async_context(&src, 1));
        assert!(!in_async_context(&src, 4));
        assert!(in_async_context(&src, 6));
    }

    #[test]
    fn test_workspace_sources_found() {
        assert!(!rust_files("journal/core/src").is_empty());
    }
}
