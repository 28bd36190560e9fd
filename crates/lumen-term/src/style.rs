// SPDX-License-Identifier: MIT
//
// Style — the decoration state attached to every character lumen draws.
//
// A Style is a small Copy value: optional foreground, optional background,
// and a bitfield of text attributes. `None` colors and an empty attribute
// set mean "whatever the terminal does by default", which is also what an
// SGR reset (`ESC [ 0 m`) returns the terminal to.
//
// Styles are compared, not mutated in place. The ANSI encoder turns a pair
// of styles into the single SGR sequence that moves the terminal from one
// to the other (see `ansi::transition`).

use crate::color::Color;

// ─── Text Attributes ─────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attributes stored as a compact bitfield.
    ///
    /// ```
    /// use lumen_term::style::Attr;
    ///
    /// let style = Attr::BOLD | Attr::UNDERLINE;
    /// assert!(style.contains(Attr::BOLD));
    /// assert!(!style.contains(Attr::INVERT));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        /// SGR 1 — increased intensity.
        const BOLD          = 1 << 0;
        /// SGR 4 — single straight underline.
        const UNDERLINE     = 1 << 1;
        /// SGR 9 — crossed-out text.
        const STRIKETHROUGH = 1 << 2;
        /// SGR 7 — swap foreground and background.
        const INVERT        = 1 << 3;
    }
}

// ─── Style ───────────────────────────────────────────────────────────────────

/// Resolved decoration state for a run of characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Style {
    /// Foreground color, `None` for the terminal default.
    pub fg: Option<Color>,
    /// Background color, `None` for the terminal default.
    pub bg: Option<Color>,
    /// Active text attributes.
    pub attrs: Attr,
}

impl Style {
    /// The terminal default style (no colors, no attributes).
    pub const DEFAULT: Self = Self {
        fg: None,
        bg: None,
        attrs: Attr::empty(),
    };

    /// Whether this is the terminal default style.
    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }

    /// A copy with the given foreground color.
    #[inline]
    #[must_use]
    pub const fn with_fg(self, fg: Option<Color>) -> Self {
        Self { fg, ..self }
    }

    /// A copy with the given background color.
    #[inline]
    #[must_use]
    pub const fn with_bg(self, bg: Option<Color>) -> Self {
        Self { bg, ..self }
    }

    /// A copy with `attr` switched on or off.
    #[inline]
    #[must_use]
    pub fn with_attr(self, attr: Attr, on: bool) -> Self {
        let mut attrs = self.attrs;
        attrs.set(attr, on);
        Self { attrs, ..self }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
