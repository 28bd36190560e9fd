// SPDX-License-Identifier: MIT
//
// TextBuffer — the output of one render pass.
//
// A buffer is a list of logical lines; a line is a list of spans, each a run
// of text sharing one resolved `Style`. Appending text in the same style as
// the previous span extends that span, so two buffers with the same visible
// content and styling compare equal no matter how the render block chopped
// up its `text` calls. The diff engine relies on that equality.
//
// Every line is self-contained when encoded: it starts from the terminal
// default style and returns to it before the line ends. A line can then be
// repainted on its own without knowing what style the terminal was left in.
//
// Tabs are expanded to spaces on the way in, so every column a line takes
// up is one the width math can see.
//
// Physical height is the only place terminal width enters. A logical line
// that is wider than the terminal soft-wraps onto extra rows, and the diff
// engine needs to know how many rows to move across.

use std::io::{self, Write};

use lumen_term::ansi;
use lumen_term::style::Style;
use unicode_width::UnicodeWidthChar;

// ─── Span ────────────────────────────────────────────────────────────────────

/// A run of text in one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub style: Style,
    pub text: String,
}

// ─── Line ────────────────────────────────────────────────────────────────────

/// One logical line: what sits between two line breaks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    spans: Vec<Span>,
}

impl Line {
    /// An empty line.
    #[must_use]
    pub const fn new() -> Self {
        Self { spans: Vec::new() }
    }

    /// The styled runs, in order. Never contains an empty span.
    #[inline]
    #[must_use]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Whether the line has no text.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Append text with no line breaks in it.
    fn push_str(&mut self, style: Style, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.spans.push(Span {
                style,
                text: text.to_owned(),
            }),
        }
    }

    /// The text without styling.
    #[must_use]
    pub fn plain(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Display width in terminal columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.chars().map(char_width).sum()
    }

    /// Physical rows this line occupies on a terminal `width` columns wide.
    ///
    /// Always at least 1. A line exactly `width` columns wide fills one row;
    /// the terminal only wraps when another character follows. A wide
    /// character that does not fit in the last column moves to the next row
    /// whole, as terminals do. `None` (or zero) width never wraps.
    #[must_use]
    pub fn num_rows(&self, width: Option<usize>) -> usize {
        let Some(width) = width.filter(|&w| w > 0) else {
            return 1;
        };

        let mut rows = 1;
        let mut col = 0;
        for w in self.chars().map(char_width) {
            if col + w > width {
                rows += 1;
                col = 0;
            }
            col += w;
        }
        rows
    }

    /// Encode the line: style transitions and text, ending in the default
    /// style. No cursor motion, no line break.
    ///
    /// # Errors
    ///
    /// Propagates errors from the writer.
    pub fn write_ansi(&self, w: &mut impl Write) -> io::Result<()> {
        let mut current = Style::DEFAULT;
        for span in &self.spans {
            ansi::transition(w, &current, &span.style)?;
            w.write_all(span.text.as_bytes())?;
            current = span.style;
        }
        if !current.is_default() {
            ansi::reset(w)?;
        }
        Ok(())
    }

    /// Number of SGR sequences [`write_ansi`](Self::write_ansi) emits.
    #[must_use]
    pub fn transition_count(&self) -> usize {
        let mut count = 0;
        let mut current = Style::DEFAULT;
        for span in &self.spans {
            if span.style != current {
                count += 1;
            }
            current = span.style;
        }
        count + usize::from(!current.is_default())
    }

    fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.spans.iter().flat_map(|s| s.text.chars())
    }
}

/// Columns a character occupies. Control characters count as zero.
fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

// ─── TextBuffer ──────────────────────────────────────────────────────────────

/// Columns between tab stops.
pub const TAB_WIDTH: usize = 8;

/// Lines of styled text produced by one render pass.
///
/// Always holds at least one (possibly empty) line: the line the cursor is
/// on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<Line>,
}

impl TextBuffer {
    /// A buffer holding one empty line.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: vec![Line::new()],
        }
    }

    /// Append text in `style`. Each `\n` starts a new line; `\r` is dropped,
    /// since a bare carriage return would desynchronize the cursor math.
    /// A `\t` becomes spaces up to the next multiple of [`TAB_WIDTH`]
    /// columns.
    pub fn push_str(&mut self, style: Style, text: &str) {
        let mut segments = text.split('\n');
        if let Some(first) = segments.next() {
            self.push_segment(style, first);
        }
        for segment in segments {
            self.newline();
            self.push_segment(style, segment);
        }
    }

    fn push_segment(&mut self, style: Style, segment: &str) {
        let last = self.last_line_mut();
        if !segment.contains(['\r', '\t']) {
            last.push_str(style, segment);
            return;
        }
        let mut col = last.width();
        let mut expanded = String::with_capacity(segment.len());
        for ch in segment.chars() {
            match ch {
                '\r' => {}
                '\t' => {
                    let pad = TAB_WIDTH - col % TAB_WIDTH;
                    expanded.extend(std::iter::repeat_n(' ', pad));
                    col += pad;
                }
                _ => {
                    expanded.push(ch);
                    col += char_width(ch);
                }
            }
        }
        last.push_str(style, &expanded);
    }

    /// Start a new, empty line.
    pub fn newline(&mut self) {
        self.lines.push(Line::new());
    }

    fn last_line_mut(&mut self) -> &mut Line {
        if self.lines.is_empty() {
            self.lines.push(Line::new());
        }
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    /// The logical lines.
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Line `index`, if it exists.
    #[inline]
    #[must_use]
    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Number of logical lines (at least 1).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the buffer is a single empty line.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(Line::is_empty) && self.lines.len() <= 1
    }

    /// Physical rows the buffer occupies at `width` (`None` = unbounded).
    #[must_use]
    pub fn num_lines(&self, width: Option<usize>) -> usize {
        self.lines.iter().map(|l| l.num_rows(width)).sum::<usize>().max(1)
    }

    /// Whether the last logical line is an empty line following a break.
    #[must_use]
    pub fn ends_with_newline(&self) -> bool {
        self.lines.len() > 1 && self.lines.last().is_some_and(Line::is_empty)
    }

    /// This buffer, with a line break appended unless it already ends in one.
    #[must_use]
    pub fn with_trailing_newline(mut self) -> Self {
        if !self.ends_with_newline() {
            self.newline();
        }
        self
    }

    /// The text without styling, lines joined with `\n`.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(Line::plain)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Total SGR sequences needed to encode the buffer.
    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.lines.iter().map(Line::transition_count).sum()
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
