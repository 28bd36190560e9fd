// SPDX-License-Identifier: MIT
//
// Terminal colors.
//
// lumen passes colors straight through to the terminal: a palette index or a
// 24-bit RGB triple, nothing more. There is no color-space math here — the
// terminal decides what "red" looks like, and an RGB value is emitted as-is
// with the TrueColor SGR form.
//
// Palette layout (what the index in `Ansi256` means):
//
//   0–7     standard colors (black, red, green, yellow, blue, magenta, cyan, white)
//   8–15    bright variants of the standard colors
//   16–255  extended palette (6×6×6 cube + grayscale ramp)

use std::fmt;

// ─── Color ───────────────────────────────────────────────────────────────────

/// A foreground or background color as the terminal understands it.
///
/// "Use the terminal's default color" is not a variant: styles hold an
/// `Option<Color>` and `None` means default.
///
/// ```
/// use lumen_term::color::Color;
///
/// assert_eq!(Color::RED, Color::Ansi256(1));
/// assert_eq!(Color::RED.bright(), Color::Ansi256(9));
/// assert_eq!(Color::hex("#ff8000"), Some(Color::Rgb(255, 128, 0)));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// ANSI 256-color palette index.
    Ansi256(u8),
    /// 24-bit `TrueColor`.
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Self = Self::Ansi256(0);
    pub const RED: Self = Self::Ansi256(1);
    pub const GREEN: Self = Self::Ansi256(2);
    pub const YELLOW: Self = Self::Ansi256(3);
    pub const BLUE: Self = Self::Ansi256(4);
    pub const MAGENTA: Self = Self::Ansi256(5);
    pub const CYAN: Self = Self::Ansi256(6);
    pub const WHITE: Self = Self::Ansi256(7);

    /// The bright variant of a standard color (index 0–7 → 8–15).
    ///
    /// Colors that are already bright, extended, or RGB are returned unchanged.
    #[inline]
    #[must_use]
    pub const fn bright(self) -> Self {
        match self {
            Self::Ansi256(idx) if idx < 8 => Self::Ansi256(idx + 8),
            other => other,
        }
    }

    /// Parse a hex color: `#RGB` or `#RRGGBB`, with or without the `#`.
    ///
    /// Returns `None` for anything else.
    #[must_use]
    pub fn hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        let bytes = s.as_bytes();

        match bytes.len() {
            3 => {
                let r = parse_hex_digit(bytes[0])?;
                let g = parse_hex_digit(bytes[1])?;
                let b = parse_hex_digit(bytes[2])?;
                Some(Self::Rgb(r << 4 | r, g << 4 | g, b << 4 | b))
            }
            6 => {
                let r = parse_hex_byte(&bytes[0..2])?;
                let g = parse_hex_byte(&bytes[2..4])?;
                let b = parse_hex_byte(&bytes[4..6])?;
                Some(Self::Rgb(r, g, b))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
            Self::Ansi256(idx) => write!(f, "ansi({idx})"),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[inline]
const fn parse_hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[inline]
fn parse_hex_byte(bytes: &[u8]) -> Option<u8> {
    let hi = parse_hex_digit(bytes[0])?;
    let lo = parse_hex_digit(bytes[1])?;
    Some(hi << 4 | lo)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_colors_are_standard_palette() {
        assert_eq!(Color::BLACK, Color::Ansi256(0));
        assert_eq!(Color::WHITE, Color::Ansi256(7));
    }

    #[test]
    fn bright_shifts_standard_colors() {
        assert_eq!(Color::BLACK.bright(), Color::Ansi256(8));
        assert_eq!(Color::CYAN.bright(), Color::Ansi256(14));
    }

    #[test]
    fn bright_leaves_other_colors_alone() {
        assert_eq!(Color::Ansi256(9).bright(), Color::Ansi256(9));
        assert_eq!(Color::Ansi256(200).bright(), Color::Ansi256(200));
        assert_eq!(Color::Rgb(1, 2, 3).bright(), Color::Rgb(1, 2, 3));
    }

    #[test]
    fn hex_six_digits() {
        assert_eq!(Color::hex("#00ff7f"), Some(Color::Rgb(0, 255, 127)));
        assert_eq!(Color::hex("00FF7F"), Some(Color::Rgb(0, 255, 127)));
    }

    #[test]
    fn hex_three_digits_expand() {
        assert_eq!(Color::hex("#f80"), Some(Color::Rgb(255, 136, 0)));
    }

    #[test]
    fn hex_rejects_garbage() {
        assert_eq!(Color::hex(""), None);
        assert_eq!(Color::hex("#12345"), None);
        assert_eq!(Color::hex("#zzzzzz"), None);
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", Color::Rgb(255, 0, 16)), "#ff0010");
        assert_eq!(format!("{}", Color::Ansi256(42)), "ansi(42)");
    }
}
