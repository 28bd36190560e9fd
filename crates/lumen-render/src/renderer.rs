// SPDX-License-Identifier: MIT
//
// Renderer — what a render block draws with.
//
// One Renderer exists per render pass. It pairs a fresh `SectionState` with
// a fresh `TextBuffer`: decoration calls go to the state, text calls stamp
// the state's current style onto the buffer. When the block returns, the
// pass calls `finish` and the Renderer is gone.
//
// All builder methods return `&mut Self` so a block can chain them:
//
//     r.bold().fg(Color::GREEN).text("ok").clear_all().textln(" done");

use std::panic::{self, AssertUnwindSafe};

use lumen_term::color::Color;
use lumen_term::style::{Attr, Style};
use unicode_segmentation::UnicodeSegmentation;

use crate::state::{Decoration, SectionState};
use crate::text_buffer::TextBuffer;

/// Builds one [`TextBuffer`] from a render block.
#[derive(Debug, Default)]
pub struct Renderer {
    state: SectionState,
    buffer: TextBuffer,
    input_text: String,
    /// Byte offset into `input_text`, on a char boundary.
    input_cursor: usize,
    drew_input: bool,
}

impl Renderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer whose [`input`](Self::input) widget shows `text` with the
    /// cursor at byte offset `cursor`.
    #[must_use]
    pub fn with_input(text: impl Into<String>, cursor: usize) -> Self {
        let input_text = text.into();
        let input_cursor = clamp_to_boundary(&input_text, cursor);
        Self {
            input_text,
            input_cursor,
            ..Self::default()
        }
    }

    // ── Text ────────────────────────────────────────────────────────

    /// Append text in the current style. Embedded `\n` start new lines.
    pub fn text(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.buffer.push_str(self.state.style(), text.as_ref());
        self
    }

    /// Append text, then a line break.
    pub fn textln(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.text(text).newline()
    }

    pub fn newline(&mut self) -> &mut Self {
        self.buffer.newline();
        self
    }

    // ── Decorations ─────────────────────────────────────────────────

    pub fn fg(&mut self, color: Color) -> &mut Self {
        self.state.set_fg(color);
        self
    }

    pub fn bg(&mut self, color: Color) -> &mut Self {
        self.state.set_bg(color);
        self
    }

    pub fn bold(&mut self) -> &mut Self {
        self.state.set_attr(Attr::BOLD);
        self
    }

    pub fn underline(&mut self) -> &mut Self {
        self.state.set_attr(Attr::UNDERLINE);
        self
    }

    pub fn strikethrough(&mut self) -> &mut Self {
        self.state.set_attr(Attr::STRIKETHROUGH);
        self
    }

    pub fn invert(&mut self) -> &mut Self {
        self.state.set_attr(Attr::INVERT);
        self
    }

    /// Drop one decoration back to the default.
    pub fn clear(&mut self, decoration: Decoration) -> &mut Self {
        self.state.clear(decoration);
        self
    }

    /// Drop every decoration.
    pub fn clear_all(&mut self) -> &mut Self {
        self.state.clear_all();
        self
    }

    /// The style the next character will be drawn in.
    #[must_use]
    pub const fn style(&self) -> Style {
        self.state.style()
    }

    /// Run `f` in a nested decoration scope.
    ///
    /// Whatever `f` does to decorations is undone when it returns. If `f`
    /// panics, the scope is still closed before the panic continues.
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.state.push();
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        self.state.pop();
        match result {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    // ── Line input ──────────────────────────────────────────────────

    /// Draw the line-input widget: the pending input text with the grapheme
    /// under the cursor inverted, or an inverted space when the cursor is at
    /// the end.
    ///
    /// Drawing it is also what tells the session that this section accepts
    /// line input.
    pub fn input(&mut self) -> &mut Self {
        self.drew_input = true;

        let text = std::mem::take(&mut self.input_text);
        let (before, rest) = text.split_at(self.input_cursor);
        let under = rest.graphemes(true).next().unwrap_or(" ");
        let after = rest.get(under.len()..).unwrap_or("");

        self.text(before);
        self.scoped(|r| {
            r.invert().text(under);
        });
        self.text(after);
        self.input_text = text;
        self
    }

    /// Whether [`input`](Self::input) was called during this pass.
    #[inline]
    #[must_use]
    pub const fn drew_input(&self) -> bool {
        self.drew_input
    }

    /// Open scopes at this point of the pass.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.depth()
    }

    /// End the pass and take the buffer.
    #[must_use]
    pub fn finish(self) -> TextBuffer {
        self.buffer
    }
}

/// Largest char boundary of `text` at or before `index`.
fn clamp_to_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(f: impl FnOnce(&mut Renderer)) -> TextBuffer {
        let mut r = Renderer::new();
        f(&mut r);
        r.finish()
    }

    fn ansi(buf: &TextBuffer) -> String {
        let mut out = Vec::new();
        for line in buf.lines() {
            line.write_ansi(&mut out).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    // ── Text ────────────────────────────────────────────────────────────

    #[test]
    fn textln_breaks_line() {
        let buf = render(|r| {
            r.textln("a").text("b");
        });
        assert_eq!(buf.plain_text(), "a\nb");
    }

    #[test]
    fn text_accepts_owned_strings() {
        let count = 3;
        let buf = render(|r| {
            r.text(format!("count: {count}"));
        });
        assert_eq!(buf.plain_text(), "count: 3");
    }

    // ── Deferred decorations ────────────────────────────────────────────

    #[test]
    fn set_then_clear_emits_nothing() {
        let buf = render(|r| {
            r.bold().clear(Decoration::Bold).text("x");
        });
        assert_eq!(buf.transition_count(), 0);
        assert_eq!(ansi(&buf), "x");
    }

    #[test]
    fn decoration_without_text_emits_nothing() {
        let buf = render(|r| {
            r.text("x").fg(Color::RED).underline();
        });
        assert_eq!(ansi(&buf), "x");
    }

    #[test]
    fn decoration_realized_on_next_char() {
        let buf = render(|r| {
            r.text("a").fg(Color::RED).text("b");
        });
        assert_eq!(ansi(&buf), "a\x1b[31mb\x1b[0m");
    }

    #[test]
    fn overridden_color_never_appears() {
        let buf = render(|r| {
            r.fg(Color::RED).fg(Color::BLUE).text("x");
        });
        assert_eq!(ansi(&buf), "\x1b[34mx\x1b[0m");
    }

    #[test]
    fn overridden_scope_leaves_no_trace() {
        let buf = render(|r| {
            r.scoped(|r| {
                r.bold().invert();
            });
            r.text("x");
        });
        assert_eq!(buf.transition_count(), 0);
    }

    // ── Scopes ──────────────────────────────────────────────────────────

    #[test]
    fn scoped_restores_style() {
        let mut r = Renderer::new();
        r.fg(Color::GREEN);
        let before = r.style();
        let value = r.scoped(|r| {
            r.bold().bg(Color::RED).text("in");
            42
        });
        assert_eq!(value, 42);
        assert_eq!(r.style(), before);
        assert_eq!(r.depth(), 0);
    }

    #[test]
    fn scoped_restores_after_panic() {
        let mut r = Renderer::new();
        r.underline();
        let before = r.style();
        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            r.scoped(|r| {
                r.bold();
                panic!("boom");
            });
        }));
        assert!(caught.is_err());
        assert_eq!(r.style(), before);
        assert_eq!(r.depth(), 0);
    }

    // ── Line input ──────────────────────────────────────────────────────

    fn render_input(text: &str, cursor: usize, f: impl FnOnce(&mut Renderer)) -> TextBuffer {
        let mut r = Renderer::with_input(text, cursor);
        f(&mut r);
        r.finish()
    }

    #[test]
    fn input_inverts_char_under_cursor() {
        let buf = render_input("abc", 1, |r| {
            r.input();
        });
        assert_eq!(buf.plain_text(), "abc");
        assert_eq!(ansi(&buf), "a\x1b[7mb\x1b[27mc");
    }

    #[test]
    fn input_cursor_at_end_draws_space() {
        let buf = render_input("hi", 2, |r| {
            r.text("> ").input();
        });
        assert_eq!(buf.plain_text(), "> hi ");
        assert_eq!(ansi(&buf), "> hi\x1b[7m \x1b[0m");
    }

    #[test]
    fn input_inverts_whole_grapheme() {
        let buf = render_input("e\u{301}x", 0, |r| {
            r.input();
        });
        let spans = buf.line(0).unwrap().spans();
        assert_eq!(spans[0].text, "e\u{301}");
        assert!(spans[0].style.attrs.contains(Attr::INVERT));
    }

    #[test]
    fn input_can_be_drawn_twice() {
        let buf = render_input("ab", 0, |r| {
            r.input().newline().input();
        });
        assert_eq!(buf.plain_text(), "ab\nab");
    }

    #[test]
    fn input_is_recorded() {
        let mut r = Renderer::new();
        assert!(!r.drew_input());
        r.input();
        assert!(r.drew_input());
        assert_eq!(r.finish().plain_text(), " ");
    }

    #[test]
    fn with_input_clamps_cursor() {
        let buf = render_input("中", 1, |r| {
            r.input();
        });
        let spans = buf.line(0).unwrap().spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].style.attrs.contains(Attr::INVERT));
    }

    #[test]
    fn cursor_clamped_to_char_boundary() {
        assert_eq!(clamp_to_boundary("中", 1), 0);
        assert_eq!(clamp_to_boundary("ab", 10), 2);
    }
}
