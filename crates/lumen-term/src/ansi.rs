// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit — that's the repainter's job. This module
// just knows the byte-level encoding of every terminal command lumen needs.
//
// lumen renders inline (no alternate screen, no absolute addressing), so all
// cursor motion here is relative: up, down, carriage return. Line and screen
// erasure complete the set needed to repaint a region in place.
//
// All functions return `io::Result` propagated from the underlying writer.
// In practice they never fail when writing to `OutputBuffer` (backed by a Vec).

use std::io::{self, Write};

use crate::color::Color;
use crate::style::{Attr, Style};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor up `n` rows (CUU). Emits nothing for `n == 0`.
///
/// `ESC [ 0 A` would move one row on most terminals, so zero is special-cased.
#[inline]
pub fn cursor_up(w: &mut impl Write, n: usize) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}A")
}

/// Move the cursor down `n` rows (CUD). Emits nothing for `n == 0`.
///
/// CUD never scrolls: at the bottom margin it stops. Use line feeds to move
/// into rows that do not exist yet.
#[inline]
pub fn cursor_down(w: &mut impl Write, n: usize) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}B")
}

/// Move the cursor to column 0 of the current row.
#[inline]
pub fn carriage_return(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\r")
}

/// Move to column 0 of the next row, scrolling if the cursor is on the last row.
///
/// Raw mode disables output post-processing, so a bare `\n` would keep the
/// column. The explicit `\r` makes this behave the same in both modes.
#[inline]
pub fn next_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\r\n")
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Erasure ─────────────────────────────────────────────────────────────────

/// Erase the entire current row (EL 2). The cursor does not move.
#[inline]
pub fn erase_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2K")
}

/// Erase from the cursor to the end of the current row (EL 0).
#[inline]
pub fn erase_line_end(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

/// Erase from the cursor to the end of the screen (ED 0).
#[inline]
pub fn erase_below(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[J")
}

/// Clear the entire screen and its scrollback, then home the cursor.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[H\x1b[2J\x1b[3J")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Style Transitions ───────────────────────────────────────────────────────

/// Emit the single SGR sequence that moves the terminal from `from` to `to`.
///
/// Only the parameters that differ are written, semicolon-separated inside
/// one CSI: attributes switched off first (22/24/27/29), then attributes
/// switched on (1/4/7/9), then foreground, then background. Identical styles
/// emit nothing at all.
///
/// No SGR 0 is used, so the transition never disturbs state it did not
/// intend to change.
pub fn transition(w: &mut impl Write, from: &Style, to: &Style) -> io::Result<()> {
    if from == to {
        return Ok(());
    }

    w.write_all(b"\x1b[")?;
    let mut first = true;

    macro_rules! param {
        ($($arg:tt)*) => {
            if !first {
                w.write_all(b";")?;
            }
            write!(w, $($arg)*)?;
            first = false;
        };
    }

    let removed = from.attrs - to.attrs;
    let added = to.attrs - from.attrs;

    if removed.contains(Attr::BOLD) {
        param!("22");
    }
    if removed.contains(Attr::UNDERLINE) {
        param!("24");
    }
    if removed.contains(Attr::INVERT) {
        param!("27");
    }
    if removed.contains(Attr::STRIKETHROUGH) {
        param!("29");
    }

    if added.contains(Attr::BOLD) {
        param!("1");
    }
    if added.contains(Attr::UNDERLINE) {
        param!("4");
    }
    if added.contains(Attr::INVERT) {
        param!("7");
    }
    if added.contains(Attr::STRIKETHROUGH) {
        param!("9");
    }

    if from.fg != to.fg {
        match to.fg {
            None => {
                param!("39");
            }
            Some(color) => {
                param!("{}", ColorParam::Fg(color));
            }
        }
    }

    if from.bg != to.bg {
        match to.bg {
            None => {
                param!("49");
            }
            Some(color) => {
                param!("{}", ColorParam::Bg(color));
            }
        }
    }

    let _ = first; // Last expansion sets first; suppress dead-write warning.

    w.write_all(b"m")
}

/// SGR parameter text for a foreground or background color.
///
/// Uses compact codes for standard colors (30–37 / 40–47), bright colors
/// (90–97 / 100–107), the 256-color form for extended indices, and 24-bit
/// `TrueColor` for RGB.
enum ColorParam {
    Fg(Color),
    Bg(Color),
}

impl std::fmt::Display for ColorParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (base, bright_base, extended, color) = match *self {
            Self::Fg(color) => (30_u16, 82_u16, 38_u16, color),
            Self::Bg(color) => (40, 92, 48, color),
        };
        match color {
            Color::Ansi256(idx) if idx < 8 => write!(f, "{}", base + u16::from(idx)),
            Color::Ansi256(idx) if idx < 16 => write!(f, "{}", bright_base + u16::from(idx)),
            Color::Ansi256(idx) => write!(f, "{extended};5;{idx}"),
            Color::Rgb(r, g, b) => write!(f, "{extended};2;{r};{g};{b}"),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
