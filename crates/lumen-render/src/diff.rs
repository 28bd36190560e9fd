// SPDX-License-Identifier: MIT
//
// Differential repainter — turns two TextBuffers into a minimal repaint.
//
// lumen renders inline, below whatever the shell printed, so there are no
// absolute coordinates to jump to. Everything is relative to where the
// previous paint left the cursor: on the last row of its last line. A
// repaint therefore starts by climbing back to the top of that region,
// which needs the region's physical height, which depends on soft-wrap at
// the current terminal width.
//
// From the top, lines are walked in lockstep with the previous buffer:
//
//   - Equal line: skipped. Its rows are only counted, so the next write can
//     jump over the whole run with a single cursor-down.
//   - Changed line, same row count: jump to it, erase its rows, rewrite it.
//     Nothing below moves.
//   - Changed row count, or a line past the end of the previous buffer:
//     everything below shifts, so erase to the end of the screen and write
//     the remaining lines top to bottom.
//
// If the new buffer is shorter, the rows it no longer covers are erased.
// Asides (one-shot blocks printed above the section) push the section down
// by their own height, so a paint with asides always rewrites the section
// in full beneath them.
//
// The output for one paint is accumulated in an `OutputBuffer`. The caller
// writes it to the terminal in one call and only then `commit`s the new
// buffer as the baseline. If the write fails, or the render block never
// produced a buffer, the old baseline stays.

use lumen_term::ansi;
use lumen_term::output::OutputBuffer;

use crate::text_buffer::{Line, TextBuffer};

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// What one repaint did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Logical lines of the section (and asides) written out.
    pub lines_written: usize,
    /// Section lines that matched the baseline and were skipped.
    pub lines_skipped: usize,
    /// Total bytes of ANSI output generated.
    pub bytes_written: usize,
}

// ─── DiffRenderer ────────────────────────────────────────────────────────────

/// Repaints a section in place against its last committed buffer.
///
/// ```
/// use lumen_render::{DiffRenderer, Renderer};
///
/// let mut diff = DiffRenderer::new();
/// let mut r = Renderer::new();
/// r.textln("hello");
/// let buffer = r.finish();
///
/// diff.render(&[], &buffer, Some(80));
/// assert_eq!(diff.output(), "hello\r\n");
/// diff.commit(buffer, Some(80));
/// ```
pub struct DiffRenderer {
    output: OutputBuffer,
    baseline: Option<Baseline>,
}

struct Baseline {
    buffer: TextBuffer,
    width: Option<usize>,
}

impl DiffRenderer {
    /// A renderer with no baseline: the first paint writes everything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            output: OutputBuffer::new(),
            baseline: None,
        }
    }

    /// Whether a committed baseline exists.
    #[inline]
    #[must_use]
    pub const fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// The committed baseline buffer.
    #[must_use]
    pub fn baseline(&self) -> Option<&TextBuffer> {
        self.baseline.as_ref().map(|b| &b.buffer)
    }

    /// Whether painting `buffer` at `width` would leave the screen exactly as
    /// it is.
    #[must_use]
    pub fn matches_baseline(&self, buffer: &TextBuffer, width: Option<usize>) -> bool {
        self.baseline.as_ref().is_some_and(|b| {
            b.width == width.filter(|&w| w > 0) && b.buffer == *buffer
        })
    }

    /// Compute the repaint that turns the screen from the baseline into
    /// `asides` followed by `current`, at terminal `width`.
    ///
    /// The result is available from [`output`](Self::output) until the next
    /// call. The baseline is not changed.
    pub fn render(
        &mut self,
        asides: &[TextBuffer],
        current: &TextBuffer,
        width: Option<usize>,
    ) -> RenderStats {
        let width = width.filter(|&w| w > 0);
        let mut stats = RenderStats::default();
        let out = &mut self.output;
        out.clear();

        let previous = self.baseline.as_ref();
        if let Some(prev) = previous {
            ansi::cursor_up(out, prev.buffer.num_lines(prev.width) - 1).ok();
            ansi::carriage_return(out).ok();
        }

        // A width change reflows the old region in ways we cannot see, and
        // asides shift the section down. Either way nothing lines up.
        let mut aligned =
            previous.is_some_and(|prev| prev.width == width) && asides.is_empty();
        if previous.is_some() && !aligned {
            ansi::erase_below(out).ok();
        }

        for aside in asides {
            for line in body_lines(aside) {
                line.write_ansi(out).ok();
                ansi::next_line(out).ok();
                stats.lines_written += 1;
            }
        }

        // Rows between the cursor and the start of the next line to visit,
        // while walking the aligned prefix.
        let mut down = 0;
        let mut need_break = false;

        for (i, line) in current.lines().iter().enumerate() {
            if aligned {
                let rows = line.num_rows(width);
                match previous.and_then(|prev| prev.buffer.line(i)) {
                    Some(old) if old == line => {
                        down += rows;
                        stats.lines_skipped += 1;
                        continue;
                    }
                    Some(old) if old.num_rows(width) == rows => {
                        move_down(out, down);
                        for row in 0..rows {
                            if row > 0 {
                                ansi::cursor_down(out, 1).ok();
                            }
                            ansi::erase_line_end(out).ok();
                        }
                        ansi::cursor_up(out, rows - 1).ok();
                        line.write_ansi(out).ok();
                        stats.lines_written += 1;
                        down = 1;
                        continue;
                    }
                    Some(_) => {
                        move_down(out, down);
                        ansi::erase_below(out).ok();
                    }
                    None => {
                        // First line past the old region: open a new row.
                        ansi::cursor_down(out, down.saturating_sub(1)).ok();
                        ansi::next_line(out).ok();
                    }
                }
                aligned = false;
            } else if need_break {
                ansi::next_line(out).ok();
            }

            line.write_ansi(out).ok();
            stats.lines_written += 1;
            need_break = true;
        }

        if aligned {
            let previous_len = previous.map_or(0, |prev| prev.buffer.len());
            if current.len() < previous_len {
                // Erase the rows the shorter buffer no longer covers, then
                // step back onto its last row.
                move_down(out, down);
                ansi::erase_below(out).ok();
                ansi::cursor_up(out, 1).ok();
            } else {
                ansi::cursor_down(out, down.saturating_sub(1)).ok();
                ansi::carriage_return(out).ok();
            }
        }

        stats.bytes_written = out.len();
        stats
    }

    /// The repaint computed by the last [`render`](Self::render).
    #[inline]
    #[must_use]
    pub fn output(&self) -> &str {
        self.output.as_str()
    }

    /// Adopt `buffer`, painted at `width`, as the new baseline.
    pub fn commit(&mut self, buffer: TextBuffer, width: Option<usize>) {
        self.baseline = Some(Baseline {
            buffer,
            width: width.filter(|&w| w > 0),
        });
    }

    /// Drop the baseline. The next paint starts fresh at the cursor.
    pub fn forget(&mut self) {
        self.baseline = None;
    }
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Move `rows` rows down within the painted region, to column 0.
fn move_down(out: &mut OutputBuffer, rows: usize) {
    if rows > 0 {
        ansi::cursor_down(out, rows).ok();
        ansi::carriage_return(out).ok();
    }
}

/// The lines of an aside that carry content: a trailing empty line is only
/// the row the next block starts on.
fn body_lines(buffer: &TextBuffer) -> &[Line] {
    let lines = buffer.lines();
    if buffer.ends_with_newline() {
        &lines[..lines.len() - 1]
    } else {
        lines
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_term::style::Style;
    use pretty_assertions::assert_eq;

    fn buf(text: &str) -> TextBuffer {
        let mut b = TextBuffer::new();
        b.push_str(Style::DEFAULT, text);
        b
    }

    /// Paint `text` with no asides and commit it.
    fn paint(diff: &mut DiffRenderer, text: &str, width: Option<usize>) -> (String, RenderStats) {
        let b = buf(text);
        let stats = diff.render(&[], &b, width);
        let out = diff.output().to_owned();
        diff.commit(b, width);
        (out, stats)
    }

    // ── First paint ─────────────────────────────────────────────────────

    #[test]
    fn first_paint_writes_everything_without_moving() {
        let mut diff = DiffRenderer::new();
        let (out, stats) = paint(&mut diff, "a\nb\n", None);
        assert_eq!(out, "a\r\nb\r\n");
        assert_eq!(stats.lines_written, 3);
        assert_eq!(stats.lines_skipped, 0);
        assert_eq!(stats.bytes_written, out.len());
    }

    #[test]
    fn render_does_not_commit() {
        let mut diff = DiffRenderer::new();
        diff.render(&[], &buf("x"), None);
        assert!(!diff.has_baseline());
        diff.commit(buf("x"), None);
        assert_eq!(diff.baseline(), Some(&buf("x")));
        diff.forget();
        assert!(!diff.has_baseline());
    }

    #[test]
    fn matches_baseline_checks_width_and_content() {
        let mut diff = DiffRenderer::new();
        assert!(!diff.matches_baseline(&buf("x"), None));
        diff.commit(buf("x"), Some(10));
        assert!(diff.matches_baseline(&buf("x"), Some(10)));
        assert!(!diff.matches_baseline(&buf("x"), Some(11)));
        assert!(!diff.matches_baseline(&buf("y"), Some(10)));
    }

    // ── Repaint ─────────────────────────────────────────────────────────

    #[test]
    fn identical_repaint_only_moves_cursor() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "a\nb\n", None);
        let (out, stats) = paint(&mut diff, "a\nb\n", None);
        assert_eq!(out, "\x1b[2A\r\x1b[2B\r");
        assert_eq!(stats.lines_written, 0);
        assert_eq!(stats.lines_skipped, 3);
    }

    #[test]
    fn count_update_rewrites_one_line() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "count: 0\n", None);
        let (out, stats) = paint(&mut diff, "count: 3\n", None);
        assert_eq!(out, "\x1b[1A\r\x1b[Kcount: 3\x1b[1B\r");
        assert_eq!(stats.lines_written, 1);
        assert_eq!(stats.lines_skipped, 1);
    }

    #[test]
    fn interior_change_touches_only_that_line() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "top\nmiddle\nbottom\n", None);
        let (out, stats) = paint(&mut diff, "top\nMIDDLE\nbottom\n", None);
        assert_eq!(out, "\x1b[3A\r\x1b[1B\r\x1b[KMIDDLE\x1b[2B\r");
        assert!(!out.contains("top"));
        assert!(!out.contains("bottom"));
        assert_eq!(stats.lines_written, 1);
        assert_eq!(stats.lines_skipped, 3);
    }

    #[test]
    fn growing_buffer_appends_rows() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "a\n", None);
        // Old: ["a", ""]; new: ["a", "b", ""]. Line 1 changes from empty
        // to "b" in place, line 2 is new.
        let (out, _) = paint(&mut diff, "a\nb\n", None);
        assert_eq!(out, "\x1b[1A\r\x1b[1B\r\x1b[Kb\r\n");
    }

    #[test]
    fn shrinking_buffer_erases_leftover_rows() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "a\nb\nc\n", None);
        let (out, stats) = paint(&mut diff, "a\n", None);
        // Line 1 goes from "b" to "": rewritten as an empty line; lines
        // from index 2 on are gone.
        assert_eq!(out, "\x1b[3A\r\x1b[1B\r\x1b[K\x1b[1B\r\x1b[J\x1b[1A");
        assert_eq!(stats.lines_written, 1);
    }

    /// Column the cursor is left in after `out`, starting from column 0.
    fn column_after(out: &str) -> usize {
        let mut col = 0;
        let mut chars = out.chars();
        while let Some(c) = chars.next() {
            match c {
                '\r' => col = 0,
                // Raw mode: a bare line feed keeps the column.
                '\n' => {}
                '\x1b' => {
                    // CSI: parameters up to the final byte. A/B/J/K keep
                    // the column.
                    for f in chars.by_ref() {
                        if f.is_ascii_alphabetic() {
                            break;
                        }
                    }
                }
                _ => col += 1,
            }
        }
        col
    }

    #[test]
    fn repaint_leaves_cursor_at_line_start() {
        let cases = [
            ("count: 0\n", "count: 3\n"),
            ("a\nb\n", "a\nb\n"),
            ("top\nmiddle\nbottom\n", "top\nMIDDLE\nbottom\n"),
            ("a\nb\nc\n", "a\n"),
        ];
        for (before, after) in cases {
            let mut diff = DiffRenderer::new();
            let (first, _) = paint(&mut diff, before, None);
            assert_eq!(column_after(&first), 0, "{before:?}");
            let (out, _) = paint(&mut diff, after, None);
            assert_eq!(column_after(&out), 0, "{before:?} -> {after:?}");
        }
    }

    #[test]
    fn wrapped_repaint_leaves_cursor_at_line_start() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "abcdef\n", Some(5));
        let (out, _) = paint(&mut diff, "abcdeg\n", Some(5));
        assert_eq!(column_after(&out), 0);
    }

    // ── Wrapping ────────────────────────────────────────────────────────

    #[test]
    fn wrapped_baseline_climbs_all_rows() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "abcdef\n", Some(5));
        let (out, _) = paint(&mut diff, "abcdeg\n", Some(5));
        // "abcdef" wraps to 2 rows, plus the empty last line: climb 2.
        assert_eq!(out, "\x1b[2A\r\x1b[K\x1b[1B\x1b[K\x1b[1Aabcdeg\x1b[1B\r");
    }

    #[test]
    fn exact_width_line_is_one_row() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "abcde\n", Some(5));
        let (out, _) = paint(&mut diff, "abcdX\n", Some(5));
        assert!(out.starts_with("\x1b[1A\r"));
    }

    #[test]
    fn row_count_change_rewrites_rest() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "ab\nz\n", Some(5));
        let (out, stats) = paint(&mut diff, "abcdefg\nz\n", Some(5));
        assert_eq!(out, "\x1b[2A\r\x1b[Jabcdefg\r\nz\r\n");
        assert_eq!(stats.lines_written, 3);
    }

    #[test]
    fn width_change_repaints_in_full() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "a\n", Some(10));
        let (out, stats) = paint(&mut diff, "a\n", Some(20));
        assert_eq!(out, "\x1b[1A\r\x1b[Ja\r\n");
        assert_eq!(stats.lines_skipped, 0);
    }

    // ── Asides ──────────────────────────────────────────────────────────

    #[test]
    fn asides_print_above_section_in_order() {
        let mut diff = DiffRenderer::new();
        paint(&mut diff, "main\n", None);

        let asides = [buf("A\n"), buf("B")];
        let main = buf("main\n");
        diff.render(&asides, &main, None);
        let out = diff.output().to_owned();
        diff.commit(main, None);

        assert_eq!(out, "\x1b[1A\r\x1b[JA\r\nB\r\nmain\r\n");
        let a = out.find("A\r\n").unwrap();
        let b = out.find("B\r\n").unwrap();
        let m = out.find("main").unwrap();
        assert!(a < b && b < m);
    }

    #[test]
    fn asides_are_not_part_of_baseline() {
        let mut diff = DiffRenderer::new();
        let main = buf("main\n");
        diff.render(&[buf("A\n")], &main, None);
        diff.commit(main, None);

        let (out, _) = paint(&mut diff, "main\n", None);
        // Baseline is the section alone: climb one row, not two, and
        // never print the aside again.
        assert_eq!(out, "\x1b[1A\r\x1b[1B\r");
    }

    #[test]
    fn first_paint_with_aside() {
        let mut diff = DiffRenderer::new();
        let main = buf("m\n");
        diff.render(&[buf("hello\n")], &main, None);
        assert_eq!(diff.output(), "hello\r\nm\r\n");
    }
}
