// SPDX-License-Identifier: MIT
//
// Output buffering.
//
// A repaint is dozens of small pieces: cursor moves, erase commands, SGR
// transitions, and text. Writing each piece to the terminal separately would
// cost a syscall per piece and, worse, let the terminal display half-drawn
// states. OutputBuffer accumulates one whole repaint in memory so it reaches
// the terminal in a single `write`.
//
// The buffer is text, not bytes: the `Terminal` capability accepts `&str`,
// and everything lumen emits (escape sequences and user text) is UTF-8.

use std::io::{self, Write};

/// Default capacity: 4 KB — an inline section is rarely larger.
const DEFAULT_CAPACITY: usize = 4096;

/// Accumulates ANSI-laden text for a single terminal write.
pub struct OutputBuffer {
    buf: String,
}

impl OutputBuffer {
    /// Create an empty buffer with default capacity (4 KB).
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: String::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Append literal text.
    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    /// Append a single character.
    #[inline]
    pub fn push(&mut self, ch: char) {
        self.buf.push(ch);
    }

    /// Clear the buffer for reuse (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.buf.push_str(text);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Intentionally a no-op. The owner hands `as_str()` to the terminal.
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
