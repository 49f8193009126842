//! Line Demultiplexer
//!
//! Splits raw response bytes into newline-terminated frames. Both backend wire
//! formats are line oriented (SSE `data:` lines and bare JSON lines), so the
//! demultiplexer knows nothing about either protocol.
//!
//! Splitting happens on raw bytes: `\n` never occurs inside a multi-byte UTF-8
//! sequence, so a character cut in half by the network is reassembled before
//! the frame is converted to text.

/// Minimum buffer capacity
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Incremental line splitter
///
/// Buffers incoming bytes and yields complete frames. The trailing fragment
/// (text after the last newline) is retained for the next call.
#[derive(Debug)]
pub struct LineDemuxer {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
}

impl Default for LineDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDemuxer {
    /// Create a new demultiplexer
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
        }
    }

    /// Append a chunk and return every frame it completed
    ///
    /// Frames are returned in arrival order without their terminating
    /// newline (or `\r\n`). Empty lines are returned as empty frames.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(offset) = self.buffer[self.read_pos..]
            .iter()
            .position(|&b| b == b'\n')
        {
            let end = self.read_pos + offset;
            frames.push(line_to_string(&self.buffer[self.read_pos..end]));
            self.read_pos = end + 1;
        }

        if self.read_pos == self.buffer.len() {
            self.buffer.clear();
            self.read_pos = 0;
        }

        frames
    }

    /// Flush the leftover fragment at end of stream
    ///
    /// Returns `None` when nothing (or only whitespace) is buffered.
    pub fn finish(&mut self) -> Option<String> {
        let rest = line_to_string(&self.buffer[self.read_pos..]);
        self.buffer.clear();
        self.read_pos = 0;

        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Number of bytes waiting for a newline
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len() - self.read_pos
    }
}

fn line_to_string(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
