//! Thinking-Block Filter
//!
//! Some backends open their answer with a reasoning block such as
//! `<think> ... </think>` before the text meant for the reader. The filter
//! removes that block from the content stream while letting everything else
//! through as soon as it is known to be visible.
//!
//! # State machine
//!
//! ```text
//!            not '<'                              found </tag>, text follows
//! Scanning ───────────────────────────┐   ┌────────────────────────────────┐
//!    │                                ▼   │                                ▼
//!    │ <tag>            InThinkingBlock ──┘                          PassThrough
//!    └────────────────────▶   │                                            ▲
//!                             │ found </tag>, only whitespace follows      │
//!                             ▼                                            │
//!                  AwaitingFirstVisibleContent ────── non-whitespace ──────┘
//! ```
//!
//! Detection only happens at the very start of the content stream. Once
//! anything has been passed through, a later `<` is ordinary text.
//!
//! Text after a removed block is shown trimmed at both ends. Trailing
//! whitespace is held back until more text follows it, so the visible text
//! never ends in whitespace and does not depend on where deltas break.
//!
//! The filter never fails: malformed or unterminated blocks are flushed as
//! visible text by [`ThinkingFilter::finish`] so real content is never lost.

/// Detector state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterState {
    /// Nothing classified yet
    ///
    /// The buffer is only non-empty while it starts with `<` and no complete
    /// opening tag has been matched.
    Scanning { buffer: String },
    /// Discarding content until `</tag>` is found
    InThinkingBlock { tag: String, buffer: String },
    /// Close tag seen; holding whitespace until real text arrives
    AwaitingFirstVisibleContent { buffer: String },
    /// Everything is emitted verbatim
    PassThrough,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::Scanning {
            buffer: String::new(),
        }
    }
}

impl FilterState {
    /// Short state name for logs
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Scanning { .. } => "scanning",
            Self::InThinkingBlock { .. } => "in thinking block",
            Self::AwaitingFirstVisibleContent { .. } => "awaiting visible content",
            Self::PassThrough => "pass-through",
        }
    }

    /// Bytes held back from the caller
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        match self {
            Self::Scanning { buffer }
            | Self::InThinkingBlock { buffer, .. }
            | Self::AwaitingFirstVisibleContent { buffer } => buffer.len(),
            Self::PassThrough => 0,
        }
    }
}

/// Incremental thinking-block remover
///
/// Feed content deltas with [`push`](Self::push) and call
/// [`finish`](Self::finish) once the stream ends, however it ends.
#[derive(Debug, Default)]
pub struct ThinkingFilter {
    state: FilterState,
    /// Name of the block that was removed, if any
    suppressed_tag: Option<String>,
    /// Trailing whitespace held back after a removed block
    held_whitespace: String,
}

impl ThinkingFilter {
    /// Create a filter in the `Scanning` state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Tag name of the suppressed block, once one has been detected
    #[must_use]
    pub fn suppressed_tag(&self) -> Option<&str> {
        self.suppressed_tag.as_deref()
    }

    /// Process one content delta
    ///
    /// Returns the text that became visible, if any.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        match std::mem::replace(&mut self.state, FilterState::PassThrough) {
            FilterState::PassThrough => self.pass(delta),
            FilterState::Scanning { mut buffer } => {
                buffer.push_str(delta);
                self.scan(buffer)
            }
            FilterState::InThinkingBlock { tag, mut buffer } => {
                let searched = buffer.len();
                buffer.push_str(delta);
                self.search_close(tag, buffer, searched)
            }
            FilterState::AwaitingFirstVisibleContent { mut buffer } => {
                buffer.push_str(delta);
                self.await_visible(buffer)
            }
        }
    }

    /// End-of-stream flush
    ///
    /// Emits whatever is still held back (trimmed) unless the filter already
    /// reached `PassThrough`, where held trailing whitespace is dropped.
    /// Leaves the filter in `PassThrough`.
    pub fn finish(&mut self) -> Option<String> {
        let held = match std::mem::replace(&mut self.state, FilterState::PassThrough) {
            FilterState::PassThrough => {
                self.held_whitespace.clear();
                return None;
            }
            FilterState::Scanning { buffer }
            | FilterState::AwaitingFirstVisibleContent { buffer } => buffer,
            FilterState::InThinkingBlock { tag, mut buffer } => {
                strip_partial_close(&mut buffer, &close_tag(&tag));
                tracing::debug!(
                    tag = %tag,
                    buffered = buffer.len(),
                    "Unterminated thinking block flushed as visible text"
                );
                buffer
            }
        };

        non_empty(held.trim().to_string())
    }

    fn scan(&mut self, buffer: String) -> Option<String> {
        if buffer.is_empty() {
            self.state = FilterState::Scanning { buffer };
            return None;
        }
        if !buffer.starts_with('<') {
            return Some(buffer);
        }

        match match_open_tag(&buffer) {
            Some((tag, tag_len)) => {
                let tag = tag.to_string();
                let rest = buffer[tag_len..].to_string();
                tracing::debug!(tag = %tag, "Thinking block detected");
                self.suppressed_tag = Some(tag.clone());
                self.search_close(tag, rest, 0)
            }
            None => {
                // Either the tag is still arriving or the answer starts with
                // a literal '<'; both wait for more input or the final flush
                self.state = FilterState::Scanning { buffer };
                None
            }
        }
    }

    /// `searched` is the length of the prefix already known not to contain a
    /// complete close tag
    fn search_close(&mut self, tag: String, buffer: String, searched: usize) -> Option<String> {
        let close = close_tag(&tag);

        let mut from = searched.saturating_sub(close.len() - 1);
        while !buffer.is_char_boundary(from) {
            from -= 1;
        }

        match buffer[from..].find(&close) {
            Some(offset) => {
                let after = &buffer[from + offset + close.len()..];
                tracing::debug!(tag = %tag, suppressed = from + offset, "Thinking block closed");
                self.await_visible(after.to_string())
            }
            None => {
                self.state = FilterState::InThinkingBlock { tag, buffer };
                None
            }
        }
    }

    fn await_visible(&mut self, buffer: String) -> Option<String> {
        let visible = buffer.trim_start();
        if visible.is_empty() {
            self.state = FilterState::AwaitingFirstVisibleContent { buffer };
            None
        } else {
            self.pass(visible)
        }
    }

    /// Emit `text` in `PassThrough`
    ///
    /// After a removed block, trailing whitespace is held until non-whitespace
    /// follows it.
    fn pass(&mut self, text: &str) -> Option<String> {
        if self.suppressed_tag.is_none() {
            return non_empty(text.to_string());
        }

        let body = text.trim_end();
        if body.is_empty() {
            self.held_whitespace.push_str(text);
            return None;
        }

        let mut visible = std::mem::take(&mut self.held_whitespace);
        visible.push_str(body);
        self.held_whitespace.push_str(&text[body.len()..]);
        Some(visible)
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn close_tag(tag: &str) -> String {
    format!("</{tag}>")
}

/// Match `<NAME>` at the start of `buffer`
///
/// NAME is a letter followed by letters, digits, `_` or `-`. Returns the name
/// and the byte length of the whole tag.
fn match_open_tag(buffer: &str) -> Option<(&str, usize)> {
    let rest = buffer.strip_prefix('<')?;
    let name_len = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))?;
    let name = &rest[..name_len];

    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if starts_with_letter && rest[name_len..].starts_with('>') {
        Some((name, name_len + 2))
    } else {
        None
    }
}

/// Drop a trailing prefix of `close` (such as `</thi`) from `buffer`
fn strip_partial_close(buffer: &mut String, close: &str) {
    for len in (1..close.len()).rev() {
        if buffer.ends_with(&close[..len]) {
            buffer.truncate(buffer.len() - len);
            return;
        }
    }
}
